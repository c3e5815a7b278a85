//! Block-aligned buffers for direct I/O.
//!
//! `O_DIRECT` rejects buffers whose address is not a multiple of the device
//! block size. `Vec<u8>` only promises byte alignment, so the buffer
//! over-allocates by `block_size - 1` bytes and exposes the sub-slice that
//! starts at the first aligned address. No `unsafe` is needed.

use blkscrub_error::{Result, ScrubError};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Owned, zero-filled buffer of exactly `len` bytes whose start address is a
/// multiple of `len`.
pub struct AlignedBuf {
    backing: Vec<u8>,
    offset: usize,
    len: usize,
}

impl AlignedBuf {
    /// Allocate a buffer of `block_size` bytes aligned to `block_size`.
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(ScrubError::InvalidGeometry(
                "aligned buffer length must be > 0".to_owned(),
            ));
        }
        let total = block_size.checked_add(block_size - 1).ok_or_else(|| {
            ScrubError::InvalidGeometry(format!("block_size={block_size} overflows usize"))
        })?;
        let backing = vec![0_u8; total];
        let addr = backing.as_ptr() as usize;
        let misalignment = addr % block_size;
        let offset = if misalignment == 0 {
            0
        } else {
            block_size - misalignment
        };
        debug_assert!(offset + block_size <= backing.len());

        Ok(Self {
            backing,
            offset,
            len: block_size,
        })
    }

    /// Allocate a buffer with the same length and alignment as `self`,
    /// holding a copy of its contents.
    pub fn try_clone(&self) -> Result<Self> {
        let mut copy = Self::new(self.len)?;
        copy.copy_from_slice(self);
        Ok(copy)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.backing[self.offset..self.offset + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.backing[self.offset..self.offset + self.len]
    }

    /// Whether the start address is a multiple of the buffer length.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        (self.as_slice().as_ptr() as usize) % self.len == 0
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("addr", &format_args!("{:#x}", self.as_slice().as_ptr() as usize))
            .finish_non_exhaustive()
    }
}
