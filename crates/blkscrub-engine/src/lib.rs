#![forbid(unsafe_code)]
//! Destructive write/read-verify scrub engine.
//!
//! A session writes a deterministic pattern to every whole block of a
//! [`BlockDevice`](blkscrub_block::BlockDevice), reads every block back,
//! compares it against the regenerated pattern and flushes the device once
//! at the end. The outcome is a [`ScrubResult`]; progress flows through a
//! caller-supplied [`ProgressSink`].

mod engine;
mod options;
mod progress;
mod report;

pub use engine::ScrubEngine;
pub use options::ScrubOptions;
pub use progress::{NullProgress, ProgressEvent, ProgressSink, RecordingProgress, SessionState};
pub use report::{BlockFailure, FailureKind, Pass, ScrubResult};
