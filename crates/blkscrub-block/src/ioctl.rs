//! Linux block-device ioctls.
//!
//! `BLKGETSIZE64` is `_IOR(0x12, 114, size_t)` and writes a `u64`. The size
//! field of the request comes from `size_t`, not from the output type, so it
//! differs between 32-bit and 64-bit targets.
//! `BLKPBSZGET` is `_IO(0x12, 123)` but writes an `unsigned int` through its
//! argument. Both need the "bad" encoding, where the request number is given
//! explicitly.

#![allow(unsafe_code)]

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

mod sys {
    use nix::sys::ioctl::ioctl_num_type;
    use std::mem::size_of;

    pub(super) const BLKGETSIZE64: ioctl_num_type =
        nix::request_code_read!(0x12, 114, size_of::<libc::size_t>());
    pub(super) const BLKPBSZGET: ioctl_num_type = nix::request_code_none!(0x12, 123);

    nix::ioctl_read_bad!(blkgetsize64, BLKGETSIZE64, u64);
    nix::ioctl_read_bad!(blkpbszget, BLKPBSZGET, libc::c_uint);
}

/// Device capacity in bytes.
pub(crate) fn device_size_bytes(file: &File) -> io::Result<u64> {
    let mut size: u64 = 0;
    // SAFETY: the fd is open for the lifetime of `file`, and BLKGETSIZE64
    // writes exactly one u64 into `size`.
    unsafe { sys::blkgetsize64(file.as_raw_fd(), &raw mut size) }.map_err(io::Error::from)?;
    Ok(size)
}

/// Physical block size in bytes.
pub(crate) fn physical_block_size(file: &File) -> io::Result<u64> {
    let mut size: libc::c_uint = 0;
    // SAFETY: the fd is open for the lifetime of `file`, and BLKPBSZGET
    // writes exactly one unsigned int into `size`.
    unsafe { sys::blkpbszget(file.as_raw_fd(), &raw mut size) }.map_err(io::Error::from)?;
    Ok(u64::from(size))
}
