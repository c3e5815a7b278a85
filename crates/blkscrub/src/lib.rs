#![forbid(unsafe_code)]
//! blkscrub public API facade.
//!
//! Re-exports the engine together with the device, pattern, error and type
//! crates it is built from. Front ends (the CLI) depend on this crate only.

pub use blkscrub_engine::*;

pub use blkscrub_block as block;
pub use blkscrub_error as error;
pub use blkscrub_pattern as pattern;
pub use blkscrub_types as types;

pub use blkscrub_block::{BlockDevice, FileBlockDevice, IoMode};
pub use blkscrub_error::ScrubError;
pub use blkscrub_types::{BlockNumber, FillMethod, Geometry, Seed};
