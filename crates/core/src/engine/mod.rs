//! Interface to the media pipeline engine that builds and runs the actual
//! decode/mix/render chains.
//!
//! The core never decodes anything itself. It asks a [`PipelineEngine`] to
//! start asynchronous transitions on a media item's terminals and learns about
//! their completion through [`TerminalHandle::signal`],
//! [`MediaHandle::drained`] and [`MediaHandle::error`], which the engine calls
//! from its own worker threads.

mod simulated;
#[cfg(test)]
pub(crate) mod manual;

use std::{path::Path, sync::Weak, time::Duration};

use serde::{Deserialize, Serialize};

pub use simulated::SimulatedEngine;

use crate::{
    media::{Media, MediaShared},
    terminal::{TerminalSignal, TrackKind},
    ErrorKind, Result, SceneError, StepAck,
};

/// Identifier of a media item, unique within its scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId(pub u64);

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a media item plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Uri(String),
    Text(String),
}

impl SourceRef {
    pub fn describe(&self) -> &str {
        match self {
            Self::Uri(uri) => uri,
            Self::Text(_) => "<text>",
        }
    }
}

/// Result of resolving a source: which tracks exist and how it can be driven.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub audio: bool,
    pub video: bool,
    /// The video track is a single still picture.
    pub still: bool,
    /// The video track renders text.
    pub text: bool,
    pub seekable: bool,
    pub duration: Option<Duration>,
}

impl SourceInfo {
    pub fn audio_video(duration: Duration) -> Self {
        Self {
            audio: true,
            video: true,
            seekable: true,
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn audio_only(duration: Duration) -> Self {
        Self {
            audio: true,
            seekable: true,
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn video_only(duration: Duration) -> Self {
        Self {
            video: true,
            seekable: true,
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn still_image() -> Self {
        Self {
            video: true,
            still: true,
            ..Self::default()
        }
    }

    pub fn text() -> Self {
        Self {
            video: true,
            text: true,
            ..Self::default()
        }
    }

    pub fn has_tracks(&self) -> bool {
        self.audio || self.video
    }

    /// Frozen items show a single picture and never block or drain.
    pub fn is_frozen(&self) -> bool {
        self.still || self.text
    }

    /// Guesses the track layout of a locator from its file extension.
    pub fn from_locator(uri: &str) -> Result<Self> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if path.trim().is_empty() {
            return Err(SceneError::resolve(uri, "empty locator"));
        }

        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| SceneError::resolve(uri, "locator has no extension"))?;

        const DEFAULT_DURATION: Duration = Duration::from_secs(60);
        match extension.as_str() {
            "mp4" | "mkv" | "webm" | "ogv" | "avi" | "mov" => {
                Ok(Self::audio_video(DEFAULT_DURATION))
            }
            "mp3" | "wav" | "ogg" | "flac" | "opus" => Ok(Self::audio_only(DEFAULT_DURATION)),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" => Ok(Self::still_image()),
            other => Err(SceneError::resolve(
                uri,
                format!("unsupported container `{other}`"),
            )),
        }
    }
}

/// A rendered picture kept while a video terminal is paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub pts: Duration,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Output device of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Audio,
    Video,
}

/// Everything the engine needs to build an item's chains.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub media: MediaHandle,
    pub source: SourceRef,
    pub terminals: Vec<TerminalHandle>,
    /// Scene running time at which the item started.
    pub start_offset: Duration,
}

/// Non-owning reference to one terminal of one start generation of a media
/// item. Signals sent through a handle from an earlier generation are dropped.
#[derive(Clone)]
pub struct TerminalHandle {
    media: Weak<MediaShared>,
    id: MediaId,
    track: TrackKind,
    generation: u64,
}

impl TerminalHandle {
    pub(crate) fn new(media: Weak<MediaShared>, id: MediaId, track: TrackKind, generation: u64) -> Self {
        Self {
            media,
            id,
            track,
            generation,
        }
    }

    pub fn media_id(&self) -> MediaId {
        self.id
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reports a terminal state change. Called from engine worker threads.
    pub fn signal(&self, signal: TerminalSignal) {
        if let Some(media) = Media::upgrade(&self.media) {
            media.on_terminal_signal(self.generation, self.track, signal);
        }
    }
}

impl std::fmt::Debug for TerminalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalHandle")
            .field("media", &self.id)
            .field("track", &self.track)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Non-owning reference to a media item for item-level engine notifications.
#[derive(Clone)]
pub struct MediaHandle {
    media: Weak<MediaShared>,
    id: MediaId,
    generation: u64,
}

impl MediaHandle {
    pub(crate) fn new(media: Weak<MediaShared>, id: MediaId, generation: u64) -> Self {
        Self {
            media,
            id,
            generation,
        }
    }

    pub fn media_id(&self) -> MediaId {
        self.id
    }

    /// Every track reached end of stream.
    pub fn drained(&self) {
        if let Some(media) = Media::upgrade(&self.media) {
            media.on_drained(self.generation);
        }
    }

    /// The item's chains failed and cannot continue.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) {
        if let Some(media) = Media::upgrade(&self.media) {
            media.on_error(self.generation, kind, message.into());
        }
    }
}

impl std::fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaHandle")
            .field("media", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// The external pipeline engine.
///
/// Requests marked asynchronous must return promptly and report completion
/// through the handles. Implementations may signal from any thread, including
/// from inside the request itself: the core never holds a media lock while
/// calling into the engine.
pub trait PipelineEngine: Send + Sync {
    /// Probes a source for its tracks.
    fn resolve(&self, source: &SourceRef) -> Result<SourceInfo>;

    /// Asynchronously builds and links the item's chains. Each terminal
    /// signals [`TerminalSignal::Active`] then [`TerminalSignal::Flushed`].
    fn link(&self, request: LinkRequest) -> Result<()>;

    /// Asynchronously parks the terminal; it signals
    /// [`TerminalSignal::Blocked`].
    fn block(&self, terminal: &TerminalHandle) -> Result<()>;

    /// Asynchronously releases a parked terminal, re-feeding `freeze` first
    /// when given; it signals [`TerminalSignal::Unblocked`].
    fn unblock(&self, terminal: &TerminalHandle, freeze: Option<FrameBuffer>) -> Result<()>;

    /// Flushes and repositions the item; each terminal signals
    /// [`TerminalSignal::Flushed`].
    fn seek(&self, media: MediaId, target: Duration) -> Result<()>;

    fn position(&self, media: MediaId) -> Option<Duration>;

    fn duration(&self, media: MediaId) -> Option<Duration>;

    /// Last picture rendered by a video terminal.
    fn capture_frame(&self, terminal: &TerminalHandle) -> Option<FrameBuffer>;

    /// Tears down the item's chains. No further signals are expected.
    fn release(&self, media: MediaId);

    /// Runs or pauses the scene clock.
    fn set_playing(&self, playing: bool) -> Result<()>;

    /// Sinks that take part in lock-step stepping.
    fn sinks(&self) -> Vec<SinkKind>;

    /// Steps the clock by `delta`; every sink in [`Self::sinks`] acknowledges
    /// through `ack` once it rendered the step.
    fn step(&self, delta: Duration, ack: StepAck) -> Result<()>;
}
