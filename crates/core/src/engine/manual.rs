//! Hand-driven engine for tests: records every request and lets the test
//! decide when, and from which thread, terminals report back.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use super::{
    FrameBuffer, LinkRequest, MediaHandle, MediaId, PipelineEngine, SinkKind, SourceInfo,
    SourceRef, TerminalHandle,
};
use crate::{
    terminal::{TerminalSignal, TrackKind},
    Result, SceneError, StepAck,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Link(MediaId),
    Block(MediaId, TrackKind),
    Unblock(MediaId, TrackKind, bool),
    Seek(MediaId, Duration),
    Release(MediaId),
    SetPlaying(bool),
    Step(Duration),
}

#[derive(Default)]
struct ManualState {
    catalog: HashMap<String, SourceInfo>,
    links: HashMap<MediaId, (LinkRequest, SourceInfo)>,
    positions: HashMap<MediaId, Duration>,
    requests: Vec<Request>,
    fail_link: bool,
    fail_seek: bool,
}

pub(crate) struct ManualEngine {
    state: Mutex<ManualState>,
    sinks: Vec<SinkKind>,
}

impl ManualEngine {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_sinks(vec![SinkKind::Audio, SinkKind::Video])
    }

    pub(crate) fn with_sinks(sinks: Vec<SinkKind>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ManualState::default()),
            sinks,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().expect("manual engine lock")
    }

    pub(crate) fn register_source(&self, uri: &str, info: SourceInfo) {
        self.lock().catalog.insert(uri.to_string(), info);
    }

    pub(crate) fn fail_next_link(&self) {
        self.lock().fail_link = true;
    }

    pub(crate) fn fail_next_seek(&self) {
        self.lock().fail_seek = true;
    }

    pub(crate) fn set_position(&self, media: MediaId, position: Duration) {
        self.lock().positions.insert(media, position);
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub(crate) fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    pub(crate) fn terminal(&self, media: MediaId, track: TrackKind) -> Option<TerminalHandle> {
        self.lock()
            .links
            .get(&media)?
            .0
            .terminals
            .iter()
            .find(|terminal| terminal.track() == track)
            .cloned()
    }

    pub(crate) fn media(&self, media: MediaId) -> Option<MediaHandle> {
        self.lock()
            .links
            .get(&media)
            .map(|(request, _)| request.media.clone())
    }

    /// Fires a signal on the calling thread. The engine lock is released
    /// before the media is entered.
    pub(crate) fn signal(&self, media: MediaId, track: TrackKind, signal: TerminalSignal) {
        let terminal = self
            .terminal(media, track)
            .expect("terminal must be linked");
        terminal.signal(signal);
    }

    pub(crate) fn link_track(&self, media: MediaId, track: TrackKind) {
        self.signal(media, track, TerminalSignal::Active);
        self.signal(media, track, TerminalSignal::Flushed);
    }

    pub(crate) fn tracks(&self, media: MediaId) -> Vec<TrackKind> {
        self.lock()
            .links
            .get(&media)
            .map(|(request, _)| request.terminals.iter().map(TerminalHandle::track).collect())
            .unwrap_or_default()
    }

    pub(crate) fn broadcast(&self, media: MediaId, signal: TerminalSignal) {
        for track in self.tracks(media) {
            self.signal(media, track, signal);
        }
    }

    pub(crate) fn link_all(&self, media: MediaId) {
        for track in self.tracks(media) {
            self.link_track(media, track);
        }
    }

    pub(crate) fn is_linked(&self, media: MediaId) -> bool {
        self.lock().links.contains_key(&media)
    }
}

impl PipelineEngine for ManualEngine {
    fn resolve(&self, source: &SourceRef) -> Result<SourceInfo> {
        match source {
            SourceRef::Text(_) => Ok(SourceInfo::text()),
            SourceRef::Uri(uri) => match self.lock().catalog.get(uri) {
                Some(info) => Ok(info.clone()),
                None => SourceInfo::from_locator(uri),
            },
        }
    }

    fn link(&self, request: LinkRequest) -> Result<()> {
        let info = self.resolve(&request.source)?;
        let mut state = self.lock();
        let media = request.media.media_id();
        state.requests.push(Request::Link(media));
        if std::mem::take(&mut state.fail_link) {
            return Err(SceneError::engine("link refused"));
        }
        state.links.insert(media, (request, info));
        Ok(())
    }

    fn block(&self, terminal: &TerminalHandle) -> Result<()> {
        self.lock()
            .requests
            .push(Request::Block(terminal.media_id(), terminal.track()));
        Ok(())
    }

    fn unblock(&self, terminal: &TerminalHandle, freeze: Option<FrameBuffer>) -> Result<()> {
        self.lock().requests.push(Request::Unblock(
            terminal.media_id(),
            terminal.track(),
            freeze.is_some(),
        ));
        Ok(())
    }

    fn seek(&self, media: MediaId, target: Duration) -> Result<()> {
        let mut state = self.lock();
        state.requests.push(Request::Seek(media, target));
        if std::mem::take(&mut state.fail_seek) {
            return Err(SceneError::engine("seek refused"));
        }
        state.positions.insert(media, target);
        Ok(())
    }

    fn position(&self, media: MediaId) -> Option<Duration> {
        Some(
            self.lock()
                .positions
                .get(&media)
                .copied()
                .unwrap_or_default(),
        )
    }

    fn duration(&self, media: MediaId) -> Option<Duration> {
        self.lock().links.get(&media)?.1.duration
    }

    fn capture_frame(&self, terminal: &TerminalHandle) -> Option<FrameBuffer> {
        (terminal.track() == TrackKind::Video).then(|| FrameBuffer {
            pts: Duration::ZERO,
            width: 2,
            height: 2,
            data: vec![0; 16],
        })
    }

    fn release(&self, media: MediaId) {
        let mut state = self.lock();
        state.requests.push(Request::Release(media));
        state.links.remove(&media);
    }

    fn set_playing(&self, playing: bool) -> Result<()> {
        self.lock().requests.push(Request::SetPlaying(playing));
        Ok(())
    }

    fn sinks(&self) -> Vec<SinkKind> {
        self.sinks.clone()
    }

    fn step(&self, delta: Duration, ack: StepAck) -> Result<()> {
        self.lock().requests.push(Request::Step(delta));
        for sink in &self.sinks {
            ack.acknowledge(*sink);
        }
        Ok(())
    }
}
