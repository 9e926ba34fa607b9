//! One-shot "all terminals reached a state" synchronisation.
//!
//! A [`Barrier`] is installed by a media command on the caller thread and
//! advanced from engine worker threads while the owning media lock is held.
//! It never blocks and never calls into the engine: once every registered
//! terminal satisfies its [`Condition`], it yields the completion payload a
//! single time and is spent.

use crate::{
    media::MediaState,
    terminal::{TerminalFlags, Terminals, TrackKind},
    EventKind,
};

/// Predicate evaluated over the flags of each registered terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Linked and past the first restart marker.
    Linked,
    /// No longer feeding the scene.
    Released,
    Blocked,
    Unblocked,
    Flushed,
}

impl Condition {
    pub fn holds(self, flags: TerminalFlags) -> bool {
        match self {
            Self::Linked => flags.active && flags.flushed,
            Self::Released => !flags.active,
            Self::Blocked => flags.blocked,
            Self::Unblocked => !flags.blocked,
            Self::Flushed => flags.flushed,
        }
    }
}

#[derive(Debug)]
pub struct Barrier {
    phase: MediaState,
    condition: Condition,
    waiting: Vec<TrackKind>,
    completion: Option<EventKind>,
}

impl Barrier {
    /// Creates a barrier for an operation that runs while the media is in
    /// `phase`.
    pub fn new(phase: MediaState, condition: Condition, completion: EventKind) -> Self {
        Self {
            phase,
            condition,
            waiting: Vec::with_capacity(2),
            completion: Some(completion),
        }
    }

    /// Creates a barrier already registered on every terminal present.
    pub fn over(
        terminals: &Terminals,
        phase: MediaState,
        condition: Condition,
        completion: EventKind,
    ) -> Self {
        let mut barrier = Self::new(phase, condition, completion);
        for track in terminals.tracks() {
            barrier.register(track);
        }
        barrier
    }

    pub fn register(&mut self, track: TrackKind) {
        if !self.waiting.contains(&track) {
            self.waiting.push(track);
        }
    }

    pub fn phase(&self) -> MediaState {
        self.phase
    }

    /// A barrier is stale once the media left the state it was created for;
    /// signals reaching a stale barrier are residual and must be dropped.
    pub fn is_stale(&self, current: MediaState) -> bool {
        current != self.phase
    }

    pub fn is_spent(&self) -> bool {
        self.completion.is_none()
    }

    /// Re-evaluates the predicate after a terminal flag changed. Returns the
    /// completion payload the first time every registered terminal holds.
    pub fn on_terminal_ready(&mut self, terminals: &Terminals) -> Option<EventKind> {
        if self.completion.is_none() || self.waiting.is_empty() {
            return None;
        }

        let satisfied = self.waiting.iter().all(|track| {
            terminals
                .get(*track)
                .is_some_and(|terminal| self.condition.holds(terminal.flags()))
        });

        if satisfied {
            self.completion.take()
        } else {
            None
        }
    }
}
