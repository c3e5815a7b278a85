#![deny(unsafe_code)]
//! Block device access for blkscrub.
//!
//! Provides the [`BlockDevice`] trait (position, read, write, sync, plus the
//! two device-control queries the geometry resolver needs), a direct-I/O
//! [`FileBlockDevice`] backed by a real device node or image file, the
//! [`resolve_geometry`] resolver, and the block-aligned [`AlignedBuf`] that
//! direct I/O requires.
//!
//! The only `unsafe` in the workspace lives in the `ioctl` module, behind
//! nix's generated ioctl wrappers.

mod aligned;
mod file;
mod geometry;
#[cfg(target_os = "linux")]
mod ioctl;
pub mod mem;

pub use aligned::AlignedBuf;
pub use file::{FileBlockDevice, IoMode};
pub use geometry::resolve_geometry;

use blkscrub_error::Result;
use blkscrub_types::ByteOffset;

/// Sequential, position-based access to a block device.
///
/// Mirrors `lseek`/`read`/`write` semantics: `read` and `write` transfer at
/// most `buf.len()` bytes from the current position and report how many were
/// moved. A short transfer is not an error at this layer; the caller decides
/// what it means.
pub trait BlockDevice {
    /// Capacity in bytes (device-control query).
    fn capacity_bytes(&self) -> Result<u64>;

    /// Physical block size in bytes (device-control query).
    fn physical_block_size(&self) -> Result<u64>;

    /// Move the position to `offset`. Returns the resulting position.
    fn seek_to(&mut self, offset: ByteOffset) -> Result<u64>;

    /// Write from the current position; returns bytes written.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Read into `buf` from the current position; returns bytes read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Flush written data to stable storage.
    fn sync(&mut self) -> Result<()>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for Box<D> {
    fn capacity_bytes(&self) -> Result<u64> {
        (**self).capacity_bytes()
    }

    fn physical_block_size(&self) -> Result<u64> {
        (**self).physical_block_size()
    }

    fn seek_to(&mut self, offset: ByteOffset) -> Result<u64> {
        (**self).seek_to(offset)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}
