//! Core library for Mediascene.
//!
//! A [`Scene`] hosts several [`Media`] items that play concurrently. Media
//! commands return immediately; the item's tracks ([`terminal`]s) are driven
//! by an external [`PipelineEngine`] on its own worker threads, and a
//! [`barrier`] per operation decides when every track got there. Completions,
//! ticks, input and errors reach the application as [`Event`]s through
//! [`Scene::receive`], on the application's own thread.

pub mod barrier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod media;
pub mod scene;
pub mod terminal;
pub mod timeline;

pub use barrier::{Barrier, Condition};
pub use config::{AppConfig, EngineConfig, SceneConfig};
pub use engine::{
    FrameBuffer, LinkRequest, MediaHandle, MediaId, PipelineEngine, SimulatedEngine, SinkKind,
    SourceInfo, SourceRef, TerminalHandle,
};
pub use error::{Result, SceneError};
pub use event::{ErrorKind, Event, EventKind, EventMask, EventSource};
pub use media::{Geometry, Media, MediaFlags, MediaState, SeekLedger};
pub use scene::{Scene, SceneState};
pub use terminal::{StreamTerminal, TerminalFlags, TerminalSignal, Terminals, TrackKind};
pub use timeline::{ClockMode, PresentationClock, StepAck, TickSchedule};
