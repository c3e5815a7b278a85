#![forbid(unsafe_code)]
//! Error types for blkscrub.
//!
//! There are two kinds of failure in a scrub session and they travel on
//! different paths:
//!
//! | Kind | Carried by | Effect |
//! |------|-----------|--------|
//! | Session-fatal (no usable geometry, bad buffer request) | [`ScrubError`] | `ScrubEngine::new` returns `Err` before any block I/O |
//! | Per-block (seek, write, read, mismatch, sync) | `BlockFailure` in `blkscrub-engine` | recorded in the `ScrubResult`; the session verdict becomes "fail" |
//!
//! Device implementations return [`ScrubError`] from every operation; the
//! engine converts per-block errors into failure records, keeping the OS
//! error text.
//!
//! `blkscrub-error` MUST NOT depend on `blkscrub-types`. Conversions from
//! type-level errors (e.g. `GeometryError`) happen in `blkscrub-block`.

use thiserror::Error;

/// Unified error type for blkscrub library operations.
#[derive(Debug, Error)]
pub enum ScrubError {
    /// Operating system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device capacity query failed. Fatal: no I/O is attempted.
    #[error("can't get device capacity: {source}")]
    GeometryUnavailable {
        #[source]
        source: std::io::Error,
    },

    /// Geometry values are unusable (zero block size and similar).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Buffer or offset violates the direct-I/O alignment contract.
    #[error("misaligned I/O: {0}")]
    Misaligned(String),
}

impl ScrubError {
    /// POSIX errno equivalent, for exit status reporting.
    ///
    /// Exhaustive: a new variant does not compile until it has an
    /// errno.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) | Self::GeometryUnavailable { source: err } => {
                err.raw_os_error().unwrap_or(libc::EIO)
            }
            Self::InvalidGeometry(_) | Self::Misaligned(_) => libc::EINVAL,
        }
    }
}

/// Result alias using `ScrubError`.
pub type Result<T> = std::result::Result<T, ScrubError>;
