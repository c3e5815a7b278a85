//! Progress reporting seam.
//!
//! The engine never prints. It calls a [`ProgressSink`] at pass boundaries,
//! at a bounded cadence during a pass, and for every failure; the front end
//! decides what that looks like.

use crate::report::{BlockFailure, Pass};
use blkscrub_types::{BlockNumber, Geometry};

/// Session lifecycle: `Idle → Writing → (Reading | Done) → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Writing,
    Reading,
    Done,
}

/// Receiver of engine progress. Every method defaults to a no-op.
pub trait ProgressSink {
    fn on_state_change(&mut self, _from: SessionState, _to: SessionState) {}

    fn on_pass_start(&mut self, _pass: Pass, _geometry: &Geometry) {}

    /// Called every `progress_interval` blocks and on the last block, after
    /// positioning and before the block's I/O.
    fn on_progress(&mut self, _pass: Pass, _block: BlockNumber, _block_count: u64) {}

    /// Called as soon as a failure is recorded.
    fn on_failure(&mut self, _failure: &BlockFailure) {}

    fn on_pass_end(&mut self, _pass: Pass, _blocks_done: u64) {}

    /// Called right before the final flush to stable storage.
    fn on_sync(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// One callback, as seen by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    State { from: SessionState, to: SessionState },
    PassStart(Pass),
    Progress { pass: Pass, block: BlockNumber },
    Failure(BlockFailure),
    PassEnd { pass: Pass, blocks_done: u64 },
    Sync,
}

/// Keeps every callback in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    pub events: Vec<ProgressEvent>,
}

impl RecordingProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks reported through `on_progress` for `pass`.
    #[must_use]
    pub fn progress_blocks(&self, pass: Pass) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress { pass: p, block } if *p == pass => Some(block.0),
                _ => None,
            })
            .collect()
    }

    /// States entered, in order.
    #[must_use]
    pub fn states(&self) -> Vec<SessionState> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::State { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn passes_started(&self) -> Vec<Pass> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::PassStart(pass) => Some(*pass),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&BlockFailure> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Failure(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_state_change(&mut self, from: SessionState, to: SessionState) {
        self.events.push(ProgressEvent::State { from, to });
    }

    fn on_pass_start(&mut self, pass: Pass, _geometry: &Geometry) {
        self.events.push(ProgressEvent::PassStart(pass));
    }

    fn on_progress(&mut self, pass: Pass, block: BlockNumber, _block_count: u64) {
        self.events.push(ProgressEvent::Progress { pass, block });
    }

    fn on_failure(&mut self, failure: &BlockFailure) {
        self.events.push(ProgressEvent::Failure(failure.clone()));
    }

    fn on_pass_end(&mut self, pass: Pass, blocks_done: u64) {
        self.events.push(ProgressEvent::PassEnd { pass, blocks_done });
    }

    fn on_sync(&mut self) {
        self.events.push(ProgressEvent::Sync);
    }
}
