//! Application-visible notifications.
//!
//! Every [`Event`] names the entity that raised it ([`EventSource`]) and
//! belongs to exactly one class of [`EventMask`], which the scene uses to
//! filter what `Scene::receive` hands back to the application.

use std::{fmt, ops};

use serde::{Deserialize, Serialize};

use crate::Media;

/// Bit set of event classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u32);

const MASK_NAMES: [(&str, EventMask); 10] = [
    ("tick", EventMask::TICK),
    ("key", EventMask::KEY),
    ("pointer_move", EventMask::POINTER_MOVE),
    ("pointer_click", EventMask::POINTER_CLICK),
    ("start", EventMask::START),
    ("stop", EventMask::STOP),
    ("pause", EventMask::PAUSE),
    ("seek", EventMask::SEEK),
    ("error", EventMask::ERROR),
    ("quit", EventMask::QUIT),
];

impl EventMask {
    pub const NONE: Self = Self(0);
    pub const TICK: Self = Self(1 << 0);
    pub const KEY: Self = Self(1 << 1);
    pub const POINTER_MOVE: Self = Self(1 << 2);
    pub const POINTER_CLICK: Self = Self(1 << 3);
    pub const START: Self = Self(1 << 4);
    pub const STOP: Self = Self(1 << 5);
    pub const PAUSE: Self = Self(1 << 6);
    pub const SEEK: Self = Self(1 << 7);
    pub const ERROR: Self = Self(1 << 8);
    pub const QUIT: Self = Self(1 << 9);
    pub const INPUT: Self = Self(Self::KEY.0 | Self::POINTER_MOVE.0 | Self::POINTER_CLICK.0);
    pub const ALL: Self = Self((1 << 10) - 1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Looks up a class by its configuration name (`"tick"`, `"input"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(Self::ALL),
            "none" => Some(Self::NONE),
            "input" => Some(Self::INPUT),
            _ => MASK_NAMES
                .iter()
                .find(|(candidate, _)| *candidate == name)
                .map(|(_, mask)| *mask),
        }
    }

    /// Names of the classes set in this mask; `["all"]` for the full set.
    pub fn names(self) -> Vec<&'static str> {
        if self == Self::ALL {
            return vec!["all"];
        }
        MASK_NAMES
            .iter()
            .filter(|(_, mask)| self.contains(*mask))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl ops::BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for EventMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl ops::Not for EventMask {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

/// Category of an asynchronous pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A track could not be linked into the scene.
    Link,
    /// The stream could not be decoded.
    Decode,
    /// The source stopped delivering data.
    Stream,
    /// A device or system resource failed.
    Resource,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Link => "link",
            Self::Decode => "decode",
            Self::Stream => "stream",
            Self::Resource => "resource",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Entity that raised an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSource {
    Scene,
    Media(Media),
}

impl EventSource {
    pub fn media(&self) -> Option<&Media> {
        match self {
            Self::Media(media) => Some(media),
            Self::Scene => None,
        }
    }

    pub fn is_scene(&self) -> bool {
        matches!(self, Self::Scene)
    }
}

impl PartialEq<Media> for EventSource {
    fn eq(&self, other: &Media) -> bool {
        self.media() == Some(other)
    }
}

/// Kind-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Tick {
        serial: u64,
    },
    Key {
        name: String,
        pressed: bool,
    },
    PointerMove {
        x: i32,
        y: i32,
    },
    PointerClick {
        x: i32,
        y: i32,
        button: u8,
        pressed: bool,
    },
    Start {
        resume: bool,
    },
    Stop {
        eos: bool,
    },
    Pause,
    Seek {
        relative: bool,
        offset: i64,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    Quit,
}

impl EventKind {
    pub fn mask(&self) -> EventMask {
        match self {
            Self::Tick { .. } => EventMask::TICK,
            Self::Key { .. } => EventMask::KEY,
            Self::PointerMove { .. } => EventMask::POINTER_MOVE,
            Self::PointerClick { .. } => EventMask::POINTER_CLICK,
            Self::Start { .. } => EventMask::START,
            Self::Stop { .. } => EventMask::STOP,
            Self::Pause => EventMask::PAUSE,
            Self::Seek { .. } => EventMask::SEEK,
            Self::Error { .. } => EventMask::ERROR,
            Self::Quit => EventMask::QUIT,
        }
    }

    /// Lifecycle kinds complete an asynchronous media operation.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Start { .. } | Self::Stop { .. } | Self::Pause | Self::Seek { .. } | Self::Error { .. }
        )
    }
}

/// Immutable notification delivered through the scene's queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    source: EventSource,
    kind: EventKind,
    /// Run of the raising media item; `None` for everything else.
    run: Option<u64>,
}

impl Event {
    pub fn new(source: EventSource, kind: EventKind) -> Self {
        Self {
            source,
            kind,
            run: None,
        }
    }

    pub(crate) fn from_scene(kind: EventKind) -> Self {
        Self::new(EventSource::Scene, kind)
    }

    pub(crate) fn from_media(media: &Media, run: u64, kind: EventKind) -> Self {
        Self {
            run: Some(run),
            ..Self::new(EventSource::Media(media.clone()), kind)
        }
    }

    pub fn tick(serial: u64) -> Self {
        Self::from_scene(EventKind::Tick { serial })
    }

    pub fn quit() -> Self {
        Self::from_scene(EventKind::Quit)
    }

    pub fn key(name: impl Into<String>, pressed: bool) -> Self {
        Self::from_scene(EventKind::Key {
            name: name.into(),
            pressed,
        })
    }

    pub fn pointer_move(x: i32, y: i32) -> Self {
        Self::from_scene(EventKind::PointerMove { x, y })
    }

    pub fn pointer_click(x: i32, y: i32, button: u8, pressed: bool) -> Self {
        Self::from_scene(EventKind::PointerClick {
            x,
            y,
            button,
            pressed,
        })
    }

    pub fn source(&self) -> &EventSource {
        &self.source
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn mask(&self) -> EventMask {
        self.kind.mask()
    }

    pub(crate) fn run(&self) -> Option<u64> {
        self.run
    }

    /// Same payload, raised on behalf of another source.
    pub fn retarget(&self, source: EventSource) -> Self {
        Self::new(source, self.kind.clone())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            EventSource::Scene => f.write_str("scene")?,
            EventSource::Media(media) => write!(f, "media#{}", media.id())?,
        }
        match &self.kind {
            EventKind::Tick { serial } => write!(f, " tick #{serial}"),
            EventKind::Key { name, pressed } => {
                write!(f, " key {name} {}", if *pressed { "press" } else { "release" })
            }
            EventKind::PointerMove { x, y } => write!(f, " pointer-move ({x},{y})"),
            EventKind::PointerClick {
                x,
                y,
                button,
                pressed,
            } => write!(
                f,
                " pointer-click ({x},{y}) button={button} {}",
                if *pressed { "press" } else { "release" }
            ),
            EventKind::Start { resume } => write!(f, " start resume={resume}"),
            EventKind::Stop { eos } => write!(f, " stop eos={eos}"),
            EventKind::Pause => f.write_str(" pause"),
            EventKind::Seek { relative, offset } => {
                write!(f, " seek relative={relative} offset={offset}")
            }
            EventKind::Error { kind, message } => write!(f, " error {kind}: {message}"),
            EventKind::Quit => f.write_str(" quit"),
        }
    }
}
