//! Failure records and the session result.

use blkscrub_types::{BlockNumber, FillMethod, Geometry, Seed};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Failure taxonomy ────────────────────────────────────────────────────────

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    None,
    /// Positioning the device failed or landed somewhere else.
    SeekFailed,
    /// Write error or short write.
    WriteFailed,
    /// Read error or short read.
    ReadFailed,
    /// Data read back differs from the pattern written. Non-fatal.
    MismatchFailed,
    /// Flushing to stable storage failed at session end.
    SyncFailed,
}

impl FailureKind {
    /// Whether this kind stops the pass it happens in.
    #[must_use]
    pub fn aborts_pass(self) -> bool {
        matches!(self, Self::SeekFailed | Self::WriteFailed | Self::ReadFailed)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::SeekFailed => write!(f, "seek_failed"),
            Self::WriteFailed => write!(f, "write_failed"),
            Self::ReadFailed => write!(f, "read_failed"),
            Self::MismatchFailed => write!(f, "mismatch_failed"),
            Self::SyncFailed => write!(f, "sync_failed"),
        }
    }
}

/// The two passes of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    Write,
    Verify,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

// ── Failures ────────────────────────────────────────────────────────────────

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFailure {
    /// Pass the failure happened in; `None` for the final sync.
    pub pass: Option<Pass>,
    /// Offending block; `None` for the final sync.
    pub block: Option<BlockNumber>,
    pub kind: FailureKind,
    /// OS error text or mismatch description.
    pub detail: String,
}

impl BlockFailure {
    #[must_use]
    pub fn at_block(pass: Pass, block: BlockNumber, kind: FailureKind, detail: String) -> Self {
        Self {
            pass: Some(pass),
            block: Some(block),
            kind,
            detail,
        }
    }

    #[must_use]
    pub fn sync(detail: String) -> Self {
        Self {
            pass: None,
            block: None,
            kind: FailureKind::SyncFailed,
            detail,
        }
    }
}

impl fmt::Display for BlockFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let block = self.block.map_or(0, |b| b.0);
        match self.kind {
            FailureKind::SeekFailed => write!(f, "Seek failed at block {block}: {}", self.detail),
            FailureKind::WriteFailed => {
                write!(f, "Write failed at block {block}: {}", self.detail)
            }
            FailureKind::ReadFailed => write!(f, "Read failed at block {block}: {}", self.detail),
            FailureKind::MismatchFailed => {
                write!(f, "Incorrect pattern read at block {block}: {}", self.detail)
            }
            FailureKind::SyncFailed => write!(f, "Sync failed: {}", self.detail),
            FailureKind::None => write!(f, "no failure"),
        }
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Outcome of a scrub session, accumulated across both passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubResult {
    pub geometry: Geometry,
    pub fill_method: FillMethod,
    pub seed: Seed,
    pub wipe_only: bool,
    /// Whether the verify pass executed at all.
    pub verify_ran: bool,
    /// Blocks fully written.
    pub blocks_written: u64,
    /// Blocks fully read back (matching or not).
    pub blocks_verified: u64,
    /// Block of the first failure with a block index.
    pub first_failure_block: Option<u64>,
    /// Kind of the first failure recorded.
    pub failure_kind: FailureKind,
    /// Every failure, in the order it happened.
    pub failures: Vec<BlockFailure>,
}

impl ScrubResult {
    #[must_use]
    pub fn new(geometry: Geometry, fill_method: FillMethod, seed: Seed, wipe_only: bool) -> Self {
        Self {
            geometry,
            fill_method,
            seed,
            wipe_only,
            verify_ran: false,
            blocks_written: 0,
            blocks_verified: 0,
            first_failure_block: None,
            failure_kind: FailureKind::None,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, failure: BlockFailure) {
        if self.failure_kind == FailureKind::None {
            self.failure_kind = failure.kind;
        }
        if self.first_failure_block.is_none() {
            self.first_failure_block = failure.block.map(|b| b.0);
        }
        self.failures.push(failure);
    }

    /// The session verdict.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Blocks processed across both passes.
    #[must_use]
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_written + self.blocks_verified
    }

    /// True once a seek/write/read error has been recorded.
    #[must_use]
    pub fn has_aborting_failure(&self) -> bool {
        self.failures.iter().any(|f| f.kind.aborts_pass())
    }

    /// Blocks whose content did not match, ascending.
    #[must_use]
    pub fn mismatched_blocks(&self) -> Vec<u64> {
        self.failures_of(FailureKind::MismatchFailed)
            .filter_map(|f| f.block.map(|b| b.0))
            .collect()
    }

    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &BlockFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

impl fmt::Display for ScrubResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.geometry.block_count();
        write!(f, "wrote {}/{count} blocks", self.blocks_written)?;
        if self.verify_ran {
            write!(f, ", verified {}/{count} blocks", self.blocks_verified)?;
        }
        write!(
            f,
            ": {} ({} failures)",
            if self.passed() { "passed" } else { "failed" },
            self.failures.len()
        )
    }
}
