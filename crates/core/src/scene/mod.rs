//! Shared presentation surface and its event queue.
//!
//! Every thread may [`Scene::dispatch`] events; only the thread draining
//! [`Scene::receive`] consumes them. Lifecycle events raised by media items
//! are intercepted on the way out so the item's `finish_*` step runs on the
//! consuming thread, never on an engine worker.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::{
    engine::{MediaId, PipelineEngine},
    timeline::{ClockMode, PresentationClock, StepAck, TickSchedule},
    Event, EventKind, EventMask, EventSource, Media, MediaState, Result, SceneConfig, SceneError,
};

/// Lifecycle of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneState {
    Stopped,
    Starting,
    Started,
    Paused,
    Stopping,
    Disposed,
}

impl SceneState {
    /// Live scenes accept children and events.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Started | Self::Paused)
    }
}

/// Handle to a scene. Clones refer to the same scene.
#[derive(Clone)]
pub struct Scene {
    shared: Arc<SceneShared>,
}

pub(crate) struct SceneShared {
    config: SceneConfig,
    engine: Arc<dyn PipelineEngine>,
    inner: Mutex<SceneInner>,
    bus_tx: Sender<Event>,
    bus_rx: Receiver<Event>,
    ticker: Receiver<Instant>,
    quit_tx: Mutex<Option<Sender<()>>>,
    quit_rx: Receiver<()>,
    next_media_id: AtomicU64,
}

struct SceneInner {
    state: SceneState,
    children: Vec<Media>,
    mask: EventMask,
    clock: PresentationClock,
    ticks: TickSchedule,
}

impl Scene {
    /// Creates and starts a scene driven by `engine`.
    pub fn new(config: SceneConfig, engine: Arc<dyn PipelineEngine>) -> Result<Scene> {
        config.validate()?;
        let mask = config.event_mask()?;
        let mode = if config.lock_step {
            ClockMode::LockStep
        } else {
            ClockMode::RealTime
        };

        let (bus_tx, bus_rx) = crossbeam_channel::unbounded();
        let (quit_tx, quit_rx) = crossbeam_channel::bounded(1);
        let ticker = if config.lock_step {
            crossbeam_channel::never()
        } else {
            crossbeam_channel::tick(config.tick_interval())
        };

        let scene = Scene {
            shared: Arc::new(SceneShared {
                inner: Mutex::new(SceneInner {
                    state: SceneState::Starting,
                    children: Vec::new(),
                    mask,
                    clock: PresentationClock::new(mode),
                    ticks: TickSchedule::new(config.tick_interval()),
                }),
                config,
                engine,
                bus_tx,
                bus_rx,
                ticker,
                quit_tx: Mutex::new(Some(quit_tx)),
                quit_rx,
                next_media_id: AtomicU64::new(1),
            }),
        };

        if let Err(err) = scene.shared.engine.set_playing(true) {
            scene.write(|inner| inner.state = SceneState::Stopped);
            return Err(err);
        }
        scene.write(|inner| {
            inner.clock.resume();
            inner.state = SceneState::Started;
        });
        debug!(
            width = scene.width(),
            height = scene.height(),
            lock_step = scene.is_lock_step(),
            "scene started"
        );
        Ok(scene)
    }

    /// Shorthand for a real-time scene of the given size.
    pub fn with_size(width: u32, height: u32, engine: Arc<dyn PipelineEngine>) -> Result<Scene> {
        Self::new(SceneConfig::new(width, height), engine)
    }

    pub(crate) fn upgrade(weak: &Weak<SceneShared>) -> Option<Scene> {
        weak.upgrade().map(|shared| Scene { shared })
    }

    fn lock(&self) -> Result<MutexGuard<'_, SceneInner>> {
        self.shared
            .inner
            .lock()
            .map_err(|_| SceneError::Poisoned("scene"))
    }

    fn read<T>(&self, f: impl FnOnce(&SceneInner) -> T) -> T {
        let inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&inner)
    }

    fn write<T>(&self, f: impl FnOnce(&mut SceneInner) -> T) -> T {
        let mut inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    /// Allocates an id and adds the item built by `build` to the children.
    pub(crate) fn register_media(
        &self,
        build: impl FnOnce(MediaId, Weak<SceneShared>, Arc<dyn PipelineEngine>) -> Media,
    ) -> Result<Media> {
        let mut inner = self.lock()?;
        if !inner.state.is_live() {
            return Err(SceneError::SceneNotLive);
        }
        let id = MediaId(self.shared.next_media_id.fetch_add(1, Ordering::Relaxed));
        let media = build(
            id,
            Arc::downgrade(&self.shared),
            Arc::clone(&self.shared.engine),
        );
        inner.children.push(media.clone());
        debug!(media = %id, children = inner.children.len(), "media added");
        Ok(media)
    }

    /// Queues `event` for the application. Returns `false`, leaving the queue
    /// untouched, when the scene is not live.
    pub fn dispatch(&self, event: Event) -> bool {
        let Ok(inner) = self.lock() else {
            return false;
        };
        if !inner.state.is_live() {
            trace!(%event, state = ?inner.state, "dropping event");
            return false;
        }
        self.shared.bus_tx.send(event).is_ok()
    }

    /// Retrieves the next event that passes the scene mask.
    ///
    /// With `block` set this waits until an event is available and always
    /// returns `Some`; once the scene has quit it returns a `Quit` event.
    /// Without `block` it polls once and returns `None` when nothing is
    /// pending.
    pub fn receive(&self, block: bool) -> Option<Event> {
        loop {
            let event = match self.next_event(block) {
                Some(event) => event,
                None if block => continue,
                None => return None,
            };

            let Some(event) = self.intercept(event) else {
                continue;
            };
            let is_quit = matches!(event.kind(), EventKind::Quit);
            if is_quit || self.mask().intersects(event.mask()) {
                return Some(event);
            }
            trace!(%event, "event masked out");
        }
    }

    /// One unit of queue work: a pending event, a tick, or a quit.
    fn next_event(&self, block: bool) -> Option<Event> {
        if let Ok(event) = self.shared.bus_rx.try_recv() {
            return Some(event);
        }
        if !self.state().is_live() {
            return Some(Event::quit());
        }

        if !block {
            return match self.shared.ticker.try_recv() {
                Ok(_) => self.tick_event(),
                Err(_) => None,
            };
        }

        crossbeam_channel::select! {
            recv(self.shared.bus_rx) -> event => event.ok(),
            recv(self.shared.ticker) -> _ => self.tick_event(),
            recv(self.shared.quit_rx) -> _ => Some(Event::quit()),
        }
    }

    /// Turns a timer firing into a tick, unless the scene clock is paused.
    fn tick_event(&self) -> Option<Event> {
        self.write(|inner| {
            (inner.state == SceneState::Started).then(|| Event::tick(inner.ticks.next_serial()))
        })
    }

    /// Bus handler: completes media operations and retargets scene clicks.
    /// Lifecycle events left over from an earlier run of their item are
    /// swallowed.
    fn intercept(&self, event: Event) -> Option<Event> {
        let event = match (event.source(), event.kind(), event.run()) {
            (EventSource::Media(media), kind, Some(run)) if kind.is_lifecycle() => {
                if !media.finish(kind, run) {
                    return None;
                }
                event
            }
            (EventSource::Scene, EventKind::PointerClick { x, y, .. }, _) => {
                match self.topmost_at(*x, *y) {
                    Some(media) => {
                        trace!(media = %media.id(), x, y, "click retargeted");
                        event.retarget(EventSource::Media(media))
                    }
                    None => event,
                }
            }
            _ => event,
        };
        Some(event)
    }

    /// Top-most live item under a point, by z-order then insertion order.
    pub fn topmost_at(&self, x: i32, y: i32) -> Option<Media> {
        let (width, height) = (self.width(), self.height());
        self.children()
            .into_iter()
            .enumerate()
            .filter(|(_, media)| {
                !matches!(media.state(), MediaState::Stopped | MediaState::Disposed)
                    && media.geometry().contains(x, y, width, height)
            })
            .max_by_key(|(index, media)| (media.z(), *index))
            .map(|(_, media)| media)
    }

    /// Disposes `media` if it belongs to this scene. Returns `false` for
    /// items of another scene or items already removed.
    pub fn remove(&self, media: &Media) -> bool {
        if !self.forget(media) {
            return false;
        }
        media.teardown();
        true
    }

    /// Drops `media` from the children list without touching the item.
    pub(crate) fn forget(&self, media: &Media) -> bool {
        self.write(|inner| {
            let before = inner.children.len();
            inner.children.retain(|child| child != media);
            let removed = inner.children.len() != before;
            if removed {
                debug!(media = %media.id(), children = inner.children.len(), "media removed");
            }
            removed
        })
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.bus_rx.len()
    }

    /// Pauses the scene clock and every sink.
    pub fn pause(&self) -> bool {
        self.transition(SceneState::Started, SceneState::Paused, false)
    }

    pub fn resume(&self) -> bool {
        self.transition(SceneState::Paused, SceneState::Started, true)
    }

    fn transition(&self, from: SceneState, to: SceneState, playing: bool) -> bool {
        let changed = self.write(|inner| {
            if inner.state != from {
                return false;
            }
            inner.state = to;
            if playing {
                inner.clock.resume();
            } else {
                inner.clock.pause();
            }
            true
        });
        if !changed {
            return false;
        }

        if let Err(err) = self.shared.engine.set_playing(playing) {
            warn!(%err, ?to, "engine refused scene transition");
            self.write(|inner| {
                if inner.state == to {
                    inner.state = from;
                    if playing {
                        inner.clock.pause();
                    } else {
                        inner.clock.resume();
                    }
                }
            });
            return false;
        }
        debug!(state = ?to, "scene transition");
        true
    }

    /// Stops the scene: every child is disposed, pending events are dropped
    /// and blocked receivers wake up with a `Quit` event.
    pub fn quit(&self) {
        let children = self.write(|inner| {
            if !inner.state.is_live() {
                return None;
            }
            inner.state = SceneState::Stopping;
            Some(std::mem::take(&mut inner.children))
        });
        let Some(children) = children else {
            return;
        };

        debug!(children = children.len(), "scene quitting");
        for media in &children {
            media.teardown();
        }
        if let Err(err) = self.shared.engine.set_playing(false) {
            warn!(%err, "engine refused to stop");
        }

        self.write(|inner| {
            inner.clock.pause();
            inner.state = SceneState::Stopped;
        });
        while self.shared.bus_rx.try_recv().is_ok() {}
        drop(
            self.shared
                .quit_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }

    /// Steps a lock-step scene by `delta`, waiting for every sink to render
    /// the step, then queues the ticks whose boundaries were crossed.
    pub fn advance(&self, delta: Duration) -> bool {
        match self.try_advance(delta) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "advance rejected");
                false
            }
        }
    }

    fn try_advance(&self, delta: Duration) -> Result<()> {
        if !self.is_lock_step() {
            return Err(SceneError::msg("scene is not in lock-step mode"));
        }
        if self.state() != SceneState::Started {
            return Err(SceneError::SceneNotLive);
        }

        let ack = StepAck::new(self.shared.engine.sinks());
        self.shared.engine.step(delta, ack.clone())?;
        ack.wait()?;

        let serials = {
            let mut inner = self.lock()?;
            inner.clock.advance(delta);
            let now = inner.clock.running_time();
            inner.ticks.due(now)
        };
        for serial in serials {
            self.dispatch(Event::tick(serial));
        }
        Ok(())
    }

    pub fn state(&self) -> SceneState {
        self.read(|inner| inner.state)
    }

    pub fn width(&self) -> u32 {
        self.shared.config.width
    }

    pub fn height(&self) -> u32 {
        self.shared.config.height
    }

    pub fn config(&self) -> &SceneConfig {
        &self.shared.config
    }

    pub fn is_lock_step(&self) -> bool {
        self.shared.config.lock_step
    }

    pub fn mask(&self) -> EventMask {
        self.read(|inner| inner.mask)
    }

    pub fn set_mask(&self, mask: EventMask) {
        self.write(|inner| inner.mask = mask);
    }

    pub fn running_time(&self) -> Duration {
        self.read(|inner| inner.clock.running_time())
    }

    pub fn tick_interval(&self) -> Duration {
        self.shared.config.tick_interval()
    }

    /// Snapshot of the live children.
    pub fn children(&self) -> Vec<Media> {
        self.read(|inner| inner.children.clone())
    }

    pub fn engine(&self) -> &Arc<dyn PipelineEngine> {
        &self.shared.engine
    }
}

impl PartialEq for Scene {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("width", &self.shared.config.width)
            .field("height", &self.shared.config.height)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for SceneShared {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        inner.state = SceneState::Disposed;
        for media in std::mem::take(&mut inner.children) {
            media.teardown();
        }
    }
}

#[cfg(test)]
mod tests;
