use std::fmt;

use serde::{Deserialize, Serialize};

/// Track carried by a stream terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
        })
    }
}

/// Pad-level notification raised by the engine on a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalSignal {
    /// The terminal is linked and data flows through it.
    Active,
    /// The terminal has seen its restart marker (new segment after link or seek).
    Flushed,
    /// The terminal's worker thread is parked.
    Blocked,
    /// A previously blocked terminal is flowing again.
    Unblocked,
}

/// The three independent flags of one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalFlags {
    pub active: bool,
    pub blocked: bool,
    pub flushed: bool,
}

/// Per-track record owned by a media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTerminal {
    track: TrackKind,
    flags: TerminalFlags,
}

impl StreamTerminal {
    pub fn new(track: TrackKind) -> Self {
        Self {
            track,
            flags: TerminalFlags::default(),
        }
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn flags(&self) -> TerminalFlags {
        self.flags
    }

    pub fn is_active(&self) -> bool {
        self.flags.active
    }

    pub fn is_blocked(&self) -> bool {
        self.flags.blocked
    }

    pub fn is_flushed(&self) -> bool {
        self.flags.flushed
    }

    pub fn set_active(&mut self, active: bool) {
        self.flags.active = active;
    }

    pub fn set_flushed(&mut self, flushed: bool) {
        self.flags.flushed = flushed;
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.flags.blocked = blocked;
    }

    /// Toggles the flag a signal refers to.
    pub fn apply(&mut self, signal: TerminalSignal) {
        match signal {
            TerminalSignal::Active => self.flags.active = true,
            TerminalSignal::Flushed => self.flags.flushed = true,
            TerminalSignal::Blocked => self.flags.blocked = true,
            TerminalSignal::Unblocked => self.flags.blocked = false,
        }
    }
}

/// The at most two terminals of a media item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Terminals {
    audio: Option<StreamTerminal>,
    video: Option<StreamTerminal>,
}

impl Terminals {
    pub fn new(audio: bool, video: bool) -> Self {
        Self {
            audio: audio.then(|| StreamTerminal::new(TrackKind::Audio)),
            video: video.then(|| StreamTerminal::new(TrackKind::Video)),
        }
    }

    pub fn get(&self, track: TrackKind) -> Option<&StreamTerminal> {
        match track {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    pub fn get_mut(&mut self, track: TrackKind) -> Option<&mut StreamTerminal> {
        match track {
            TrackKind::Audio => self.audio.as_mut(),
            TrackKind::Video => self.video.as_mut(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamTerminal> {
        self.audio.iter().chain(self.video.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StreamTerminal> {
        self.audio.iter_mut().chain(self.video.iter_mut())
    }

    pub fn tracks(&self) -> Vec<TrackKind> {
        self.iter().map(StreamTerminal::track).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    pub fn clear(&mut self) {
        self.audio = None;
        self.video = None;
    }
}
