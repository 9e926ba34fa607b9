use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use super::{
    FrameBuffer, LinkRequest, MediaHandle, MediaId, PipelineEngine, SinkKind, SourceInfo,
    SourceRef, TerminalHandle,
};
use crate::{
    config::EngineConfig, terminal::TerminalSignal, terminal::TrackKind, ErrorKind, Result,
    SceneError, StepAck,
};

/// Threaded stand-in for a real pipeline engine.
///
/// Every linked terminal runs on its own worker thread which answers block,
/// unblock and flush requests with the matching signal after a short delay.
/// Each scene sink runs a worker that acknowledges lock-step steps. Sources
/// are resolved by extension unless registered explicitly.
pub struct SimulatedEngine {
    config: EngineConfig,
    catalog: Mutex<HashMap<String, SourceInfo>>,
    items: Mutex<HashMap<MediaId, SimItem>>,
    sinks: Vec<(SinkKind, Sender<StepAck>)>,
    playing: AtomicBool,
}

struct SimItem {
    handle: MediaHandle,
    info: SourceInfo,
    position: Duration,
    workers: HashMap<TrackKind, Sender<TerminalCommand>>,
}

#[derive(Debug)]
enum TerminalCommand {
    Block,
    Unblock,
    Flush,
    Release,
}

impl SimulatedEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut kinds = vec![SinkKind::Audio];
        if config.video_sink {
            kinds.push(SinkKind::Video);
        }

        let sinks = kinds
            .into_iter()
            .filter_map(|kind| {
                let (tx, rx) = crossbeam_channel::unbounded::<StepAck>();
                let latency = config.signal_latency();
                thread::Builder::new()
                    .name(format!("mediascene-{kind:?}-sink").to_lowercase())
                    .spawn(move || sink_main(kind, rx, latency))
                    .map_err(|err| warn!(?kind, %err, "failed to spawn sink worker"))
                    .ok()
                    .map(|_| (kind, tx))
            })
            .collect();

        Self {
            config,
            catalog: Mutex::new(HashMap::new()),
            items: Mutex::new(HashMap::new()),
            sinks,
            playing: AtomicBool::new(false),
        }
    }

    /// Overrides extension-based resolution for `uri`.
    pub fn register_source(&self, uri: impl Into<String>, info: SourceInfo) {
        if let Ok(mut catalog) = self.catalog.lock() {
            catalog.insert(uri.into(), info);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Simulates every track of `media` reaching end of stream.
    pub fn drain(&self, media: MediaId) -> Result<()> {
        let handle = self.item_handle(media)?;
        let latency = self.config.signal_latency();
        self.spawn_notifier(media, move || {
            thread::sleep(latency);
            handle.drained();
        })
    }

    /// Simulates a fatal failure of `media`'s chains.
    pub fn fail(&self, media: MediaId, kind: ErrorKind, message: impl Into<String>) -> Result<()> {
        let handle = self.item_handle(media)?;
        let message = message.into();
        let latency = self.config.signal_latency();
        self.spawn_notifier(media, move || {
            thread::sleep(latency);
            handle.error(kind, message);
        })
    }

    fn item_handle(&self, media: MediaId) -> Result<MediaHandle> {
        self.lock_items()?
            .get(&media)
            .map(|item| item.handle.clone())
            .ok_or_else(|| SceneError::engine(format!("media #{media} is not linked")))
    }

    fn spawn_notifier(&self, media: MediaId, body: impl FnOnce() + Send + 'static) -> Result<()> {
        thread::Builder::new()
            .name(format!("mediascene-bus-{media}"))
            .spawn(body)
            .map(|_| ())
            .map_err(SceneError::from)
    }

    fn send(&self, terminal: &TerminalHandle, command: TerminalCommand) -> Result<()> {
        let items = self.lock_items()?;
        let worker = items
            .get(&terminal.media_id())
            .and_then(|item| item.workers.get(&terminal.track()))
            .ok_or_else(|| {
                SceneError::engine(format!(
                    "no {} terminal linked for media #{}",
                    terminal.track(),
                    terminal.media_id()
                ))
            })?;
        worker
            .send(command)
            .map_err(|_| SceneError::engine("terminal worker exited"))
    }

    fn lock_items(&self) -> Result<MutexGuard<'_, HashMap<MediaId, SimItem>>> {
        self.items
            .lock()
            .map_err(|_| SceneError::Poisoned("simulated engine"))
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PipelineEngine for SimulatedEngine {
    fn resolve(&self, source: &SourceRef) -> Result<SourceInfo> {
        match source {
            SourceRef::Text(_) => Ok(SourceInfo::text()),
            SourceRef::Uri(uri) => {
                let registered = self
                    .catalog
                    .lock()
                    .map_err(|_| SceneError::Poisoned("source catalog"))?
                    .get(uri)
                    .cloned();
                match registered {
                    Some(info) => Ok(info),
                    None => SourceInfo::from_locator(uri),
                }
            }
        }
    }

    fn link(&self, request: LinkRequest) -> Result<()> {
        let info = self.resolve(&request.source)?;
        let media = request.media.media_id();
        let mut workers = HashMap::new();

        for terminal in request.terminals {
            let (tx, rx) = crossbeam_channel::unbounded();
            let track = terminal.track();
            let link_latency = self.config.link_latency();
            let signal_latency = self.config.signal_latency();
            thread::Builder::new()
                .name(format!("mediascene-{media}-{track}"))
                .spawn(move || terminal_main(terminal, rx, link_latency, signal_latency))?;
            workers.insert(track, tx);
        }

        debug!(%media, source = request.source.describe(), tracks = workers.len(), "linked");
        let previous = self.lock_items()?.insert(
            media,
            SimItem {
                handle: request.media,
                info,
                position: Duration::ZERO,
                workers,
            },
        );
        if let Some(previous) = previous {
            release_workers(previous);
        }
        Ok(())
    }

    fn block(&self, terminal: &TerminalHandle) -> Result<()> {
        self.send(terminal, TerminalCommand::Block)
    }

    fn unblock(&self, terminal: &TerminalHandle, _freeze: Option<FrameBuffer>) -> Result<()> {
        self.send(terminal, TerminalCommand::Unblock)
    }

    fn seek(&self, media: MediaId, target: Duration) -> Result<()> {
        let mut items = self.lock_items()?;
        let item = items
            .get_mut(&media)
            .ok_or_else(|| SceneError::engine(format!("media #{media} is not linked")))?;
        if !item.info.seekable {
            return Err(SceneError::engine("source is not seekable"));
        }

        item.position = match item.info.duration {
            Some(duration) => target.min(duration),
            None => target,
        };
        for worker in item.workers.values() {
            worker
                .send(TerminalCommand::Flush)
                .map_err(|_| SceneError::engine("terminal worker exited"))?;
        }
        Ok(())
    }

    fn position(&self, media: MediaId) -> Option<Duration> {
        self.lock_items().ok()?.get(&media).map(|item| item.position)
    }

    fn duration(&self, media: MediaId) -> Option<Duration> {
        self.lock_items().ok()?.get(&media)?.info.duration
    }

    fn capture_frame(&self, terminal: &TerminalHandle) -> Option<FrameBuffer> {
        if terminal.track() != TrackKind::Video {
            return None;
        }
        let items = self.lock_items().ok()?;
        let item = items.get(&terminal.media_id())?;
        Some(FrameBuffer {
            pts: item.position,
            width: 1,
            height: 1,
            data: vec![0; 4],
        })
    }

    fn release(&self, media: MediaId) {
        let removed = match self.lock_items() {
            Ok(mut items) => items.remove(&media),
            Err(err) => {
                warn!(%media, %err, "cannot release media");
                None
            }
        };
        if let Some(item) = removed {
            debug!(%media, "released");
            release_workers(item);
        }
    }

    fn set_playing(&self, playing: bool) -> Result<()> {
        self.playing.store(playing, Ordering::SeqCst);
        Ok(())
    }

    fn sinks(&self) -> Vec<SinkKind> {
        self.sinks.iter().map(|(kind, _)| *kind).collect()
    }

    fn step(&self, _delta: Duration, ack: StepAck) -> Result<()> {
        for (kind, sink) in &self.sinks {
            sink.send(ack.clone())
                .map_err(|_| SceneError::engine(format!("{kind:?} sink worker exited")))?;
        }
        Ok(())
    }
}

fn release_workers(item: SimItem) {
    for worker in item.workers.into_values() {
        let _ = worker.send(TerminalCommand::Release);
    }
}

fn terminal_main(
    terminal: TerminalHandle,
    rx: Receiver<TerminalCommand>,
    link_latency: Duration,
    signal_latency: Duration,
) {
    thread::sleep(link_latency);
    terminal.signal(TerminalSignal::Active);
    terminal.signal(TerminalSignal::Flushed);

    for command in rx.iter() {
        thread::sleep(signal_latency);
        match command {
            TerminalCommand::Block => terminal.signal(TerminalSignal::Blocked),
            TerminalCommand::Unblock => terminal.signal(TerminalSignal::Unblocked),
            TerminalCommand::Flush => terminal.signal(TerminalSignal::Flushed),
            TerminalCommand::Release => break,
        }
    }
}

fn sink_main(kind: SinkKind, rx: Receiver<StepAck>, latency: Duration) {
    for ack in rx.iter() {
        thread::sleep(latency);
        ack.acknowledge(kind);
    }
}
