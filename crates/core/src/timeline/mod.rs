use std::{
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::{engine::SinkKind, Result, SceneError};

/// How the presentation clock advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Follows the wall clock while running.
    RealTime,
    /// Moves only through explicit steps.
    LockStep,
}

/// Running time shared by every item of a scene.
#[derive(Debug, Clone)]
pub struct PresentationClock {
    mode: ClockMode,
    accumulated: Duration,
    resumed_at: Option<Instant>,
}

impl PresentationClock {
    pub fn new(mode: ClockMode) -> Self {
        Self {
            mode,
            accumulated: Duration::ZERO,
            resumed_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.resumed_at.is_some()
    }

    pub fn running_time(&self) -> Duration {
        match (self.mode, self.resumed_at) {
            (ClockMode::RealTime, Some(since)) => self.accumulated + since.elapsed(),
            _ => self.accumulated,
        }
    }

    pub fn resume(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(since) = self.resumed_at.take() {
            if self.mode == ClockMode::RealTime {
                self.accumulated += since.elapsed();
            }
        }
    }

    /// Moves a lock-step clock forward. Real-time clocks ignore steps.
    pub fn advance(&mut self, delta: Duration) {
        if self.mode == ClockMode::LockStep {
            self.accumulated += delta;
        }
    }
}

/// Numbering and boundaries of the periodic tick source.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    interval: Duration,
    next_serial: u64,
    next_due: Duration,
}

impl TickSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_serial: 1,
            next_due: interval,
        }
    }

    /// Serial for the next tick raised by a real-time timer.
    pub fn next_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.next_due += self.interval;
        serial
    }

    /// Serials of every tick boundary crossed up to `now`.
    pub fn due(&mut self, now: Duration) -> Vec<u64> {
        let mut serials = Vec::new();
        if self.interval.is_zero() {
            return serials;
        }
        while self.next_due <= now {
            serials.push(self.next_serial());
        }
        serials
    }
}

/// Acknowledgement barrier used by lock-step stepping: the engine's sink
/// workers each acknowledge once, the stepping thread waits for all of them.
#[derive(Clone)]
pub struct StepAck {
    shared: Arc<StepShared>,
}

struct StepShared {
    expected: Vec<SinkKind>,
    acked: Mutex<Vec<SinkKind>>,
    condvar: Condvar,
}

impl StepAck {
    pub fn new(expected: Vec<SinkKind>) -> Self {
        Self {
            shared: Arc::new(StepShared {
                expected,
                acked: Mutex::new(Vec::new()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn expected(&self) -> &[SinkKind] {
        &self.shared.expected
    }

    /// Records that `sink` finished the step. Duplicate and unexpected
    /// acknowledgements are ignored.
    pub fn acknowledge(&self, sink: SinkKind) {
        if !self.shared.expected.contains(&sink) {
            return;
        }
        if let Ok(mut acked) = self.shared.acked.lock() {
            if !acked.contains(&sink) {
                acked.push(sink);
            }
            self.shared.condvar.notify_all();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shared
            .acked
            .lock()
            .map(|acked| acked.len() == self.shared.expected.len())
            .unwrap_or(false)
    }

    /// Blocks until every expected sink acknowledged.
    pub fn wait(&self) -> Result<()> {
        let mut acked = self
            .shared
            .acked
            .lock()
            .map_err(|_| SceneError::Poisoned("step barrier"))?;
        while acked.len() < self.shared.expected.len() {
            acked = self
                .shared
                .condvar
                .wait(acked)
                .map_err(|_| SceneError::Poisoned("step barrier"))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for StepAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepAck")
            .field("expected", &self.shared.expected)
            .finish()
    }
}
