//! Per-item asynchronous state machine.
//!
//! Commands (`start`, `stop`, `seek`, `pause`, `resume`) run on the caller
//! thread: they validate the current [`MediaState`], install a [`Barrier`]
//! over the item's terminals and hand the transition to the engine. Engine
//! worker threads report back through [`TerminalHandle`]s; the callback only
//! toggles flags, re-evaluates the barrier and, once satisfied, dispatches the
//! completion [`Event`] to the scene. The visible state is committed later by
//! the matching `finish_*` step, which the scene runs from `Scene::receive`.

mod ledger;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tracing::{debug, trace, warn};

pub use ledger::SeekLedger;

use crate::{
    barrier::{Barrier, Condition},
    engine::{
        FrameBuffer, LinkRequest, MediaHandle, MediaId, PipelineEngine, SourceInfo, SourceRef,
        TerminalHandle,
    },
    scene::{Scene, SceneShared, SceneState},
    terminal::{TerminalFlags, TerminalSignal, Terminals, TrackKind},
    ErrorKind, Event, EventKind, Result, SceneError,
};

/// Lifecycle of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaState {
    Stopped,
    Starting,
    Started,
    Seeking,
    Pausing,
    Paused,
    Resuming,
    Stopping,
    Disposed,
}

impl MediaState {
    /// Whether the item currently owns linked terminals.
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped | Self::Disposed)
    }
}

impl fmt::Display for MediaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Item-level flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaFlags {
    /// The last run ended because every track reached end of stream.
    pub drained: bool,
    /// Still image or text: a single picture, nothing to block or drain.
    pub frozen: bool,
    pub text: bool,
}

/// Placement of the item inside the scene. A zero width or height stretches
/// the item over the whole scene along that axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn contains(&self, x: i32, y: i32, scene_width: u32, scene_height: u32) -> bool {
        let width = if self.width == 0 { scene_width } else { self.width };
        let height = if self.height == 0 {
            scene_height
        } else {
            self.height
        };
        let (x, y) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        x >= left && x < left + i64::from(width) && y >= top && y < top + i64::from(height)
    }
}

/// Handle to one playable item of a scene. Clones refer to the same item.
#[derive(Clone)]
pub struct Media {
    shared: Arc<MediaShared>,
}

pub(crate) struct MediaShared {
    id: MediaId,
    scene: Weak<SceneShared>,
    engine: Arc<dyn PipelineEngine>,
    inner: Mutex<MediaInner>,
}

struct MediaInner {
    uri: Option<String>,
    text: Option<String>,
    state: MediaState,
    flags: MediaFlags,
    info: Option<SourceInfo>,
    terminals: Terminals,
    barrier: Option<Barrier>,
    generation: u64,
    ledger: SeekLedger,
    start_offset: Duration,
    freeze: Option<FrameBuffer>,
    geometry: Geometry,
    alpha: f64,
    volume: f64,
    mute: bool,
}

impl MediaInner {
    fn ensure(&self, allowed: &[MediaState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SceneError::msg(format!(
                "cannot {operation} while {}",
                self.state
            )))
        }
    }

    fn source_ref(&self) -> Result<SourceRef> {
        match (&self.text, &self.uri) {
            (Some(text), _) => Ok(SourceRef::Text(text.clone())),
            (None, Some(uri)) => Ok(SourceRef::Uri(uri.clone())),
            (None, None) => Err(SceneError::resolve("<none>", "media has no source")),
        }
    }

    fn is_frozen(&self) -> bool {
        self.flags.frozen
    }

    /// Drops every trace of the current run. Signals still in flight carry
    /// the old generation and will be ignored.
    fn reset(&mut self, state: MediaState) {
        self.terminals.clear();
        self.barrier = None;
        self.freeze = None;
        self.generation += 1;
        self.state = state;
    }
}

impl Media {
    /// Creates a stopped item inside `scene`. `uri` may be `None` for items
    /// that later receive text through [`Media::set_text`].
    pub fn new(scene: &Scene, uri: Option<&str>) -> Result<Media> {
        let uri = uri.map(str::to_string);
        scene.register_media(|id, weak_scene, engine| Media {
            shared: Arc::new(MediaShared {
                id,
                scene: weak_scene,
                engine,
                inner: Mutex::new(MediaInner {
                    uri,
                    text: None,
                    state: MediaState::Stopped,
                    flags: MediaFlags::default(),
                    info: None,
                    terminals: Terminals::default(),
                    barrier: None,
                    generation: 0,
                    ledger: SeekLedger::default(),
                    start_offset: Duration::ZERO,
                    freeze: None,
                    geometry: Geometry::default(),
                    alpha: 1.0,
                    volume: 1.0,
                    mute: false,
                }),
            }),
        })
    }

    pub(crate) fn upgrade(weak: &Weak<MediaShared>) -> Option<Media> {
        weak.upgrade().map(|shared| Media { shared })
    }

    pub fn id(&self) -> MediaId {
        self.shared.id
    }

    /// The owning scene, while it exists.
    pub fn scene(&self) -> Option<Scene> {
        Scene::upgrade(&self.shared.scene)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MediaInner>> {
        self.shared
            .inner
            .lock()
            .map_err(|_| SceneError::Poisoned("media"))
    }

    fn read<T>(&self, f: impl FnOnce(&MediaInner) -> T) -> T {
        let inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&inner)
    }

    fn write<T>(&self, f: impl FnOnce(&mut MediaInner) -> T) -> T {
        let mut inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    fn engine(&self) -> &dyn PipelineEngine {
        self.shared.engine.as_ref()
    }

    fn terminal_handle(&self, track: TrackKind, generation: u64) -> TerminalHandle {
        TerminalHandle::new(Arc::downgrade(&self.shared), self.id(), track, generation)
    }

    fn terminal_handles(&self, inner: &MediaInner) -> Vec<TerminalHandle> {
        inner
            .terminals
            .tracks()
            .into_iter()
            .map(|track| self.terminal_handle(track, inner.generation))
            .collect()
    }

    /// Hands a completion payload to the scene, stamped with the run that
    /// raised it. Called with the media lock held, which orders media before
    /// scene.
    fn dispatch(&self, run: u64, kind: EventKind) {
        let event = Event::from_media(self, run, kind);
        match self.scene() {
            Some(scene) => {
                if !scene.dispatch(event) {
                    trace!(media = %self.id(), "scene not live, event dropped");
                }
            }
            None => trace!(media = %self.id(), "scene gone, event dropped"),
        }
    }

    /// Re-evaluates the pending barrier after a flag change.
    fn advance_barrier(&self, inner: &mut MediaInner) {
        let Some(barrier) = inner.barrier.as_mut() else {
            return;
        };
        if barrier.is_stale(inner.state) {
            debug!(
                media = %self.id(),
                phase = %barrier.phase(),
                state = %inner.state,
                "dropping residual signal"
            );
            inner.barrier = None;
            return;
        }
        if let Some(kind) = barrier.on_terminal_ready(&inner.terminals) {
            inner.barrier = None;
            debug!(media = %self.id(), state = %inner.state, "barrier satisfied");
            self.dispatch(inner.generation, kind);
        }
    }

    fn report(&self, operation: &'static str, outcome: Result<()>) -> bool {
        match outcome {
            Ok(()) => true,
            Err(err) => {
                debug!(media = %self.id(), operation, %err, "command rejected");
                false
            }
        }
    }

    /// Starts playback. Completion is reported by a `Start` event.
    pub fn start(&self) -> bool {
        let outcome = self.try_start();
        self.report("start", outcome)
    }

    fn try_start(&self) -> Result<()> {
        let scene = self.scene().ok_or(SceneError::SceneNotLive)?;
        let source = {
            let inner = self.lock()?;
            inner.ensure(&[MediaState::Stopped], "start")?;
            inner.source_ref()?
        };

        let info = self.engine().resolve(&source)?;
        if !info.has_tracks() {
            return Err(SceneError::resolve(
                source.describe(),
                "no decodable track",
            ));
        }
        let start_offset = scene.running_time();

        let (request, generation) = {
            let mut inner = self.lock()?;
            inner.ensure(&[MediaState::Stopped], "start")?;
            let frozen = info.is_frozen();
            inner.generation += 1;
            inner.terminals = Terminals::new(info.audio && !frozen, info.video);
            inner.flags = MediaFlags {
                drained: false,
                frozen,
                text: info.text,
            };
            inner.ledger = SeekLedger::default();
            inner.start_offset = start_offset;
            inner.freeze = None;
            inner.barrier = Some(Barrier::over(
                &inner.terminals,
                MediaState::Starting,
                Condition::Linked,
                EventKind::Start { resume: false },
            ));
            inner.info = Some(info);
            inner.state = MediaState::Starting;
            debug!(
                media = %self.id(),
                source = source.describe(),
                tracks = inner.terminals.len(),
                ?start_offset,
                "starting"
            );

            let request = LinkRequest {
                media: MediaHandle::new(Arc::downgrade(&self.shared), self.id(), inner.generation),
                source,
                terminals: self.terminal_handles(&inner),
                start_offset,
            };
            (request, inner.generation)
        };

        if let Err(err) = self.engine().link(request) {
            warn!(media = %self.id(), %err, "engine refused to link");
            {
                let mut inner = self.lock()?;
                if inner.generation == generation && inner.state == MediaState::Starting {
                    inner.reset(MediaState::Stopped);
                }
            }
            self.engine().release(self.id());
            return Err(err);
        }
        Ok(())
    }

    /// Stops playback. Completion is reported by a `Stop` event.
    pub fn stop(&self) -> bool {
        let outcome = self.try_stop();
        self.report("stop", outcome)
    }

    fn try_stop(&self) -> Result<()> {
        let scene_paused = self
            .scene()
            .is_some_and(|scene| scene.state() == SceneState::Paused);

        let pending = {
            let mut inner = self.lock()?;
            inner.ensure(&[MediaState::Started, MediaState::Paused], "stop")?;
            inner.state = MediaState::Stopping;
            inner.barrier = Some(Barrier::over(
                &inner.terminals,
                MediaState::Stopping,
                Condition::Released,
                EventKind::Stop { eos: false },
            ));

            // A parked terminal cannot answer an asynchronous block request,
            // so its blocked path runs here.
            let mut pending = Vec::new();
            for terminal in inner.terminals.iter_mut() {
                if scene_paused || terminal.is_blocked() {
                    terminal.set_blocked(true);
                    terminal.set_active(false);
                } else {
                    pending.push(terminal.track());
                }
            }
            debug!(media = %self.id(), scene_paused, async_blocks = pending.len(), "stopping");
            self.advance_barrier(&mut inner);

            pending
                .into_iter()
                .map(|track| self.terminal_handle(track, inner.generation))
                .collect::<Vec<_>>()
        };

        for terminal in pending {
            if let Err(err) = self.engine().block(&terminal) {
                warn!(media = %self.id(), track = %terminal.track(), %err, "block failed, releasing synchronously");
                terminal.signal(TerminalSignal::Blocked);
            }
        }
        Ok(())
    }

    /// Repositions playback by `offset` nanoseconds, relative to the current
    /// position or absolute (negative absolute offsets count back from the
    /// end). Completion is reported by a `Seek` event.
    pub fn seek(&self, relative: bool, offset: i64) -> bool {
        let outcome = self.try_seek(relative, offset);
        self.report("seek", outcome)
    }

    fn try_seek(&self, relative: bool, offset: i64) -> Result<()> {
        let (generation, known_duration) = {
            let inner = self.lock()?;
            inner.ensure(&[MediaState::Started], "seek")?;
            let info = inner
                .info
                .as_ref()
                .ok_or_else(|| SceneError::msg("media not resolved"))?;
            if !info.seekable {
                return Err(SceneError::msg("media is not seekable"));
            }
            (inner.generation, info.duration)
        };

        let id = self.id();
        let position = as_nanos(self.engine().position(id).unwrap_or_default());
        let target = if relative {
            position.saturating_add(offset)
        } else if offset < 0 {
            let duration = self
                .engine()
                .duration(id)
                .or(known_duration)
                .ok_or_else(|| SceneError::msg("duration unknown, cannot seek from the end"))?;
            as_nanos(duration).saturating_add(offset)
        } else {
            offset
        };
        let target = target.max(0);
        let delta = if relative {
            offset
        } else {
            target.saturating_sub(position)
        };

        {
            let mut inner = self.lock()?;
            inner.ensure(&[MediaState::Started], "seek")?;
            if inner.generation != generation {
                return Err(SceneError::msg("media restarted during seek"));
            }
            for terminal in inner.terminals.iter_mut() {
                terminal.set_flushed(false);
            }
            inner.barrier = Some(Barrier::over(
                &inner.terminals,
                MediaState::Seeking,
                Condition::Flushed,
                EventKind::Seek { relative, offset },
            ));
            inner.state = MediaState::Seeking;
            debug!(media = %id, relative, offset, target, "seeking");
        }

        match self.engine().seek(id, Duration::from_nanos(target as u64)) {
            Ok(()) => {
                let mut inner = self.lock()?;
                if inner.generation == generation {
                    inner.ledger.commit(relative, offset, target, delta);
                }
                Ok(())
            }
            Err(err) => {
                let mut inner = self.lock()?;
                if inner.generation == generation && inner.state == MediaState::Seeking {
                    for terminal in inner.terminals.iter_mut() {
                        terminal.set_flushed(true);
                    }
                    inner.barrier = None;
                    inner.state = MediaState::Started;
                }
                Err(err)
            }
        }
    }

    /// Pauses playback. Completion is reported by a `Pause` event.
    pub fn pause(&self) -> bool {
        let outcome = self.try_pause();
        self.report("pause", outcome)
    }

    fn try_pause(&self) -> Result<()> {
        let pending = {
            let mut inner = self.lock()?;
            inner.ensure(&[MediaState::Started], "pause")?;
            if inner.is_frozen() {
                inner.state = MediaState::Paused;
                debug!(media = %self.id(), "paused frozen item");
                self.dispatch(inner.generation, EventKind::Pause);
                return Ok(());
            }
            inner.state = MediaState::Pausing;
            inner.barrier = Some(Barrier::over(
                &inner.terminals,
                MediaState::Pausing,
                Condition::Blocked,
                EventKind::Pause,
            ));
            debug!(media = %self.id(), "pausing");
            self.terminal_handles(&inner)
        };

        for terminal in pending {
            if let Err(err) = self.engine().block(&terminal) {
                self.fail(ErrorKind::Other, format!("cannot block {}: {err}", terminal.track()));
                break;
            }
        }
        Ok(())
    }

    /// Resumes a paused item. Completion is reported by a `Start` event with
    /// `resume` set.
    pub fn resume(&self) -> bool {
        let outcome = self.try_resume();
        self.report("resume", outcome)
    }

    fn try_resume(&self) -> Result<()> {
        let (pending, freeze) = {
            let mut inner = self.lock()?;
            inner.ensure(&[MediaState::Paused], "resume")?;
            if inner.is_frozen() {
                inner.state = MediaState::Started;
                debug!(media = %self.id(), "resumed frozen item");
                self.dispatch(inner.generation, EventKind::Start { resume: true });
                return Ok(());
            }
            inner.state = MediaState::Resuming;
            inner.barrier = Some(Barrier::over(
                &inner.terminals,
                MediaState::Resuming,
                Condition::Unblocked,
                EventKind::Start { resume: true },
            ));
            debug!(media = %self.id(), "resuming");
            (self.terminal_handles(&inner), inner.freeze.take())
        };

        for terminal in pending {
            let frame = match terminal.track() {
                TrackKind::Video => freeze.clone(),
                TrackKind::Audio => None,
            };
            if let Err(err) = self.engine().unblock(&terminal, frame) {
                self.fail(ErrorKind::Other, format!("cannot unblock {}: {err}", terminal.track()));
                break;
            }
        }
        Ok(())
    }

    /// Raises an asynchronous error on the caller thread.
    fn fail(&self, kind: ErrorKind, message: String) {
        warn!(media = %self.id(), %kind, %message, "media failed");
        let Ok(inner) = self.lock() else {
            return;
        };
        if inner.state.is_running() {
            self.dispatch(inner.generation, EventKind::Error { kind, message });
        }
    }

    pub(crate) fn on_terminal_signal(&self, generation: u64, track: TrackKind, signal: TerminalSignal) {
        let Ok(mut inner) = self.lock() else {
            return;
        };
        if inner.generation != generation {
            trace!(media = %self.id(), %track, ?signal, "dropping signal from an earlier run");
            return;
        }

        let stopping = inner.state == MediaState::Stopping;
        let Some(terminal) = inner.terminals.get_mut(track) else {
            trace!(media = %self.id(), %track, ?signal, "signal for a missing terminal");
            return;
        };
        terminal.apply(signal);
        if stopping && signal == TerminalSignal::Blocked {
            terminal.set_active(false);
        }
        trace!(media = %self.id(), %track, ?signal, flags = ?terminal.flags(), "terminal signal");

        self.advance_barrier(&mut inner);
    }

    pub(crate) fn on_drained(&self, generation: u64) {
        let Ok(mut inner) = self.lock() else {
            return;
        };
        if inner.generation != generation || inner.state != MediaState::Started {
            return;
        }
        if inner.is_frozen() {
            trace!(media = %self.id(), "frozen item ignores drain");
            return;
        }

        debug!(media = %self.id(), "drained");
        inner.flags.drained = true;
        inner.state = MediaState::Stopping;
        for terminal in inner.terminals.iter_mut() {
            terminal.set_active(false);
        }
        inner.barrier = Some(Barrier::over(
            &inner.terminals,
            MediaState::Stopping,
            Condition::Released,
            EventKind::Stop { eos: true },
        ));
        self.advance_barrier(&mut inner);
    }

    pub(crate) fn on_error(&self, generation: u64, kind: ErrorKind, message: String) {
        let Ok(inner) = self.lock() else {
            return;
        };
        if inner.generation != generation || !inner.state.is_running() {
            return;
        }
        warn!(media = %self.id(), %kind, %message, "engine error");
        self.dispatch(inner.generation, EventKind::Error { kind, message });
    }

    /// Commits the visible state for a lifecycle event raised by run `run`
    /// of this item. Returns `false`, committing nothing, when the item was
    /// stopped, restarted or disposed since the event was raised.
    pub(crate) fn finish(&self, kind: &EventKind, run: u64) -> bool {
        let current = self.read(|inner| inner.generation);
        if current != run {
            trace!(media = %self.id(), run, current, "dropping event from an earlier run");
            return false;
        }
        match kind {
            EventKind::Start { resume } => self.finish_start(run, *resume),
            EventKind::Stop { .. } => self.finish_stop(run),
            EventKind::Pause => self.finish_pause(run),
            EventKind::Seek { .. } => self.finish_seek(run),
            EventKind::Error { .. } => self.finish_error(run),
            _ => {}
        }
        true
    }

    fn finish_start(&self, run: u64, resume: bool) {
        self.write(|inner| {
            if inner.generation == run
                && matches!(inner.state, MediaState::Starting | MediaState::Resuming)
            {
                inner.state = MediaState::Started;
                debug!(media = %self.id(), resume, "started");
            }
        });
    }

    fn finish_seek(&self, run: u64) {
        self.write(|inner| {
            if inner.generation == run && inner.state == MediaState::Seeking {
                inner.state = MediaState::Started;
                debug!(media = %self.id(), sum = inner.ledger.sum, "seek done");
            }
        });
    }

    fn finish_pause(&self, run: u64) {
        let Some(video) = self.read(|inner| {
            (inner.generation == run && inner.state == MediaState::Pausing).then(|| {
                inner
                    .terminals
                    .get(TrackKind::Video)
                    .map(|_| self.terminal_handle(TrackKind::Video, run))
            })
        }) else {
            return;
        };

        let freeze = video.and_then(|terminal| self.engine().capture_frame(&terminal));
        self.write(|inner| {
            if inner.generation == run && inner.state == MediaState::Pausing {
                inner.freeze = freeze;
                inner.state = MediaState::Paused;
                debug!(media = %self.id(), frozen_frame = inner.freeze.is_some(), "paused");
            }
        });
    }

    fn finish_stop(&self, run: u64) {
        let released = self.write(|inner| {
            if inner.generation != run || inner.state != MediaState::Stopping {
                return false;
            }
            inner.reset(MediaState::Stopped);
            debug!(media = %self.id(), drained = inner.flags.drained, "stopped");
            true
        });
        if released {
            self.engine().release(self.id());
        }
    }

    /// Forces the stop path after an asynchronous error.
    fn finish_error(&self, run: u64) {
        let Ok(mut inner) = self.lock() else {
            return;
        };
        if inner.generation != run {
            return;
        }
        match inner.state {
            MediaState::Stopped | MediaState::Disposed => return,
            MediaState::Stopping if inner.barrier.is_none() => return,
            MediaState::Stopping => {}
            _ => {
                inner.state = MediaState::Stopping;
                inner.barrier = Some(Barrier::over(
                    &inner.terminals,
                    MediaState::Stopping,
                    Condition::Released,
                    EventKind::Stop { eos: false },
                ));
            }
        }

        debug!(media = %self.id(), "forcing stop after error");
        for terminal in inner.terminals.iter_mut() {
            terminal.set_active(false);
        }
        if inner.terminals.is_empty() {
            inner.barrier = None;
            self.dispatch(run, EventKind::Stop { eos: false });
        } else {
            self.advance_barrier(&mut inner);
        }
    }

    /// Removes the item from its scene and tears it down for good. Running
    /// chains are released without a `Stop` event; events still queued for
    /// the item are dropped.
    pub fn dispose(&self) {
        if let Some(scene) = self.scene() {
            scene.forget(self);
        }
        self.teardown();
    }

    pub(crate) fn teardown(&self) {
        let was_running = self.write(|inner| {
            if inner.state == MediaState::Disposed {
                return false;
            }
            let was_running = inner.state.is_running();
            inner.reset(MediaState::Disposed);
            was_running
        });
        if was_running {
            self.engine().release(self.id());
        }
        debug!(media = %self.id(), "disposed");
    }

    pub fn state(&self) -> MediaState {
        self.read(|inner| inner.state)
    }

    pub fn uri(&self) -> Option<String> {
        self.read(|inner| inner.uri.clone())
    }

    /// Replaces the locator; only allowed while stopped.
    pub fn set_uri(&self, uri: Option<&str>) -> bool {
        self.write(|inner| {
            if inner.state != MediaState::Stopped {
                return false;
            }
            inner.uri = uri.map(str::to_string);
            true
        })
    }

    pub fn text(&self) -> Option<String> {
        self.read(|inner| inner.text.clone())
    }

    /// Turns the item into a text item (or back, with `None`); only allowed
    /// while stopped.
    pub fn set_text(&self, text: Option<&str>) -> bool {
        self.write(|inner| {
            if inner.state != MediaState::Stopped {
                return false;
            }
            inner.text = text.map(str::to_string);
            true
        })
    }

    pub fn flags(&self) -> MediaFlags {
        self.read(|inner| inner.flags)
    }

    pub fn is_frozen(&self) -> bool {
        self.read(MediaInner::is_frozen)
    }

    pub fn ledger(&self) -> SeekLedger {
        self.read(|inner| inner.ledger)
    }

    /// Scene running time at which the current run started.
    pub fn start_offset(&self) -> Duration {
        self.read(|inner| inner.start_offset)
    }

    pub fn has_audio(&self) -> bool {
        self.read(|inner| inner.terminals.get(TrackKind::Audio).is_some())
    }

    pub fn has_video(&self) -> bool {
        self.read(|inner| inner.terminals.get(TrackKind::Video).is_some())
    }

    /// Number of terminals currently owned.
    pub fn terminal_count(&self) -> usize {
        self.read(|inner| inner.terminals.len())
    }

    pub fn terminal_flags(&self, track: TrackKind) -> Option<TerminalFlags> {
        self.read(|inner| inner.terminals.get(track).map(|terminal| terminal.flags()))
    }

    /// Frame kept for the video terminal while paused.
    pub fn freeze_frame(&self) -> Option<FrameBuffer> {
        self.read(|inner| inner.freeze.clone())
    }

    pub fn position(&self) -> Option<Duration> {
        if !self.state().is_running() {
            return None;
        }
        self.engine().position(self.id())
    }

    pub fn duration(&self) -> Option<Duration> {
        if !self.state().is_running() {
            return self.read(|inner| inner.info.as_ref().and_then(|info| info.duration));
        }
        self.engine()
            .duration(self.id())
            .or_else(|| self.read(|inner| inner.info.as_ref().and_then(|info| info.duration)))
    }

    pub fn geometry(&self) -> Geometry {
        self.read(|inner| inner.geometry)
    }

    pub fn set_geometry(&self, geometry: Geometry) {
        self.write(|inner| inner.geometry = geometry);
    }

    pub fn set_position_xy(&self, x: i32, y: i32) {
        self.write(|inner| {
            inner.geometry.x = x;
            inner.geometry.y = y;
        });
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.write(|inner| {
            inner.geometry.width = width;
            inner.geometry.height = height;
        });
    }

    pub fn z(&self) -> i32 {
        self.read(|inner| inner.geometry.z)
    }

    pub fn set_z(&self, z: i32) {
        self.write(|inner| inner.geometry.z = z);
    }

    pub fn alpha(&self) -> f64 {
        self.read(|inner| inner.alpha)
    }

    pub fn set_alpha(&self, alpha: f64) {
        self.write(|inner| inner.alpha = alpha.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f64 {
        self.read(|inner| inner.volume)
    }

    pub fn set_volume(&self, volume: f64) {
        self.write(|inner| inner.volume = volume.clamp(0.0, 10.0));
    }

    pub fn is_muted(&self) -> bool {
        self.read(|inner| inner.mute)
    }

    pub fn set_mute(&self, mute: bool) {
        self.write(|inner| inner.mute = mute);
    }
}

impl PartialEq for Media {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Media {}

impl fmt::Debug for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Media");
        out.field("id", &self.shared.id);
        match self.shared.inner.try_lock() {
            Ok(inner) => out
                .field("state", &inner.state)
                .field("uri", &inner.uri)
                .field("terminals", &inner.terminals.len()),
            Err(_) => out.field("state", &"<locked>"),
        };
        out.finish()
    }
}

fn as_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
