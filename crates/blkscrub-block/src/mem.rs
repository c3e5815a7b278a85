//! In-memory devices for tests and dry runs.
//!
//! [`MemBlockDevice`] behaves like a direct-I/O block device: transfers must
//! start on a block boundary and cover whole blocks, and anything else fails
//! with [`ScrubError::Misaligned`]. Clones share the same backing store, so a
//! test can hand one clone to the engine and inspect the other afterwards.
//!
//! [`FaultyBlockDevice`] wraps it and injects failures at chosen blocks.

use crate::BlockDevice;
use blkscrub_error::{Result, ScrubError};
use blkscrub_types::{BlockNumber, ByteOffset};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// Operation counters and the offsets that were actually transferred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoStats {
    pub seeks: u64,
    pub reads: u64,
    pub writes: u64,
    pub syncs: u64,
    pub write_offsets: Vec<u64>,
    pub read_offsets: Vec<u64>,
}

#[derive(Debug)]
struct MemState {
    bytes: Vec<u8>,
    position: u64,
    stats: IoStats,
}

/// RAM-backed block device.
#[derive(Debug, Clone)]
pub struct MemBlockDevice {
    state: Arc<Mutex<MemState>>,
    block_size: u64,
}

impl MemBlockDevice {
    /// `capacity` bytes of zeroes with the given physical block size.
    ///
    /// # Panics
    ///
    /// If `capacity` does not fit in `usize`.
    #[must_use]
    pub fn new(capacity: u64, block_size: u64) -> Self {
        let len = usize::try_from(capacity).expect("capacity fits usize");
        Self {
            state: Arc::new(Mutex::new(MemState {
                bytes: vec![0_u8; len],
                position: 0,
                stats: IoStats::default(),
            })),
            block_size,
        }
    }

    /// Copy of the whole backing store.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.lock().bytes.clone()
    }

    /// Copy of one block, or `None` past the end.
    #[must_use]
    pub fn block(&self, block: BlockNumber) -> Option<Vec<u8>> {
        let bs = usize::try_from(self.block_size).ok()?;
        let start = usize::try_from(block.0).ok()?.checked_mul(bs)?;
        let state = self.state.lock();
        state.bytes.get(start..start.checked_add(bs)?).map(<[u8]>::to_vec)
    }

    /// Overwrite stored bytes without going through the I/O path or the
    /// counters.
    ///
    /// # Panics
    ///
    /// If the range lies outside the device.
    pub fn poke(&self, offset: u64, data: &[u8]) {
        let start = usize::try_from(offset).expect("offset fits usize");
        self.state.lock().bytes[start..start + data.len()].copy_from_slice(data);
    }

    #[must_use]
    pub fn stats(&self) -> IoStats {
        self.state.lock().stats.clone()
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    fn check_aligned(&self, position: u64, len: usize) -> Result<()> {
        if self.block_size == 0 {
            return Ok(());
        }
        let len = len as u64;
        if position % self.block_size != 0 || len % self.block_size != 0 {
            return Err(ScrubError::Misaligned(format!(
                "position={position} len={len} block_size={}",
                self.block_size
            )));
        }
        Ok(())
    }
}

impl BlockDevice for MemBlockDevice {
    fn capacity_bytes(&self) -> Result<u64> {
        Ok(self.state.lock().bytes.len() as u64)
    }

    fn physical_block_size(&self) -> Result<u64> {
        Ok(self.block_size)
    }

    fn seek_to(&mut self, offset: ByteOffset) -> Result<u64> {
        let mut state = self.state.lock();
        state.position = offset.0;
        state.stats.seeks += 1;
        Ok(offset.0)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        self.check_aligned(state.position, buf.len())?;
        let start = usize::try_from(state.position).unwrap_or(usize::MAX);
        let end = start.saturating_add(buf.len()).min(state.bytes.len());
        let written = end.saturating_sub(start);
        if written > 0 {
            state.bytes[start..end].copy_from_slice(&buf[..written]);
        }
        let position = state.position;
        state.position += written as u64;
        state.stats.writes += 1;
        state.stats.write_offsets.push(position);
        drop(state);
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        self.check_aligned(state.position, buf.len())?;
        let start = usize::try_from(state.position).unwrap_or(usize::MAX);
        let end = start.saturating_add(buf.len()).min(state.bytes.len());
        let read = end.saturating_sub(start);
        if read > 0 {
            buf[..read].copy_from_slice(&state.bytes[start..end]);
        }
        let position = state.position;
        state.position += read as u64;
        state.stats.reads += 1;
        state.stats.read_offsets.push(position);
        drop(state);
        Ok(read)
    }

    fn sync(&mut self) -> Result<()> {
        self.state.lock().stats.syncs += 1;
        Ok(())
    }
}

/// Which operations a [`FaultyBlockDevice`] sabotages.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub fail_capacity: bool,
    pub fail_block_size: bool,
    /// Seek to these blocks returns an error.
    pub fail_seek: Vec<BlockNumber>,
    /// Seek to these blocks lands one block further than requested.
    pub misplace_seek: Vec<BlockNumber>,
    pub fail_write: Vec<BlockNumber>,
    /// Writes to these blocks transfer only half the buffer.
    pub short_write: Vec<BlockNumber>,
    /// Writes to these blocks succeed but store the first byte inverted.
    pub corrupt_write: Vec<BlockNumber>,
    pub fail_read: Vec<BlockNumber>,
    pub short_read: Vec<BlockNumber>,
    pub fail_sync: bool,
}

/// [`MemBlockDevice`] with injected faults.
#[derive(Debug, Clone)]
pub struct FaultyBlockDevice {
    inner: MemBlockDevice,
    plan: FaultPlan,
}

impl FaultyBlockDevice {
    #[must_use]
    pub fn new(inner: MemBlockDevice, plan: FaultPlan) -> Self {
        Self { inner, plan }
    }

    #[must_use]
    pub fn inner(&self) -> &MemBlockDevice {
        &self.inner
    }

    fn block_at(&self, offset: u64) -> BlockNumber {
        BlockNumber(offset.checked_div(self.inner.block_size).unwrap_or(0))
    }

    fn current_block(&self) -> BlockNumber {
        self.block_at(self.inner.position())
    }
}

fn injected(what: &str, block: BlockNumber) -> ScrubError {
    tracing::debug!(%block, what, "injecting fault");
    ScrubError::Io(io::Error::from_raw_os_error(libc::EIO))
}

impl BlockDevice for FaultyBlockDevice {
    fn capacity_bytes(&self) -> Result<u64> {
        if self.plan.fail_capacity {
            return Err(ScrubError::Io(io::Error::from_raw_os_error(libc::ENOTTY)));
        }
        self.inner.capacity_bytes()
    }

    fn physical_block_size(&self) -> Result<u64> {
        if self.plan.fail_block_size {
            return Err(ScrubError::Io(io::Error::from_raw_os_error(libc::ENOTTY)));
        }
        self.inner.physical_block_size()
    }

    fn seek_to(&mut self, offset: ByteOffset) -> Result<u64> {
        let block = self.block_at(offset.0);
        if self.plan.fail_seek.contains(&block) {
            return Err(injected("seek", block));
        }
        if self.plan.misplace_seek.contains(&block) {
            let wrong = offset
                .checked_add(self.inner.block_size)
                .unwrap_or(offset);
            return self.inner.seek_to(wrong);
        }
        self.inner.seek_to(offset)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let block = self.current_block();
        if self.plan.fail_write.contains(&block) {
            return Err(injected("write", block));
        }
        if self.plan.short_write.contains(&block) {
            let half = buf.len() / 2;
            let start = self.inner.position();
            // Bypass alignment checks: a short write is exactly what a
            // misbehaving device produces.
            self.inner.poke(start, &buf[..half]);
            return Ok(half);
        }
        if self.plan.corrupt_write.contains(&block) && !buf.is_empty() {
            let mut damaged = buf.to_vec();
            damaged[0] = !damaged[0];
            return self.inner.write(&damaged);
        }
        self.inner.write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let block = self.current_block();
        if self.plan.fail_read.contains(&block) {
            return Err(injected("read", block));
        }
        let read = self.inner.read(buf)?;
        if self.plan.short_read.contains(&block) {
            return Ok(read / 2);
        }
        Ok(read)
    }

    fn sync(&mut self) -> Result<()> {
        if self.plan.fail_sync {
            return Err(ScrubError::Io(io::Error::from_raw_os_error(libc::EIO)));
        }
        self.inner.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_device_round_trips_a_block() {
        let mut dev = MemBlockDevice::new(4096, 512);
        dev.seek_to(ByteOffset(1024)).expect("seek");
        assert_eq!(dev.write(&[7_u8; 512]).expect("write"), 512);
        assert_eq!(dev.block(BlockNumber(2)), Some(vec![7_u8; 512]));

        let mut back = [0_u8; 512];
        dev.seek_to(ByteOffset(1024)).expect("seek");
        assert_eq!(dev.read(&mut back).expect("read"), 512);
        assert_eq!(back, [7_u8; 512]);

        let stats = dev.stats();
        assert_eq!(stats.seeks, 2);
        assert_eq!(stats.write_offsets, vec![1024]);
        assert_eq!(stats.read_offsets, vec![1024]);
    }

    #[test]
    fn mem_device_rejects_unaligned_transfers() {
        let mut dev = MemBlockDevice::new(4096, 512);
        dev.seek_to(ByteOffset(100)).expect("seek");
        let err = dev.write(&[0_u8; 512]).expect_err("unaligned offset");
        assert!(matches!(err, ScrubError::Misaligned(_)));

        dev.seek_to(ByteOffset(0)).expect("seek");
        let err = dev.write(&[0_u8; 100]).expect_err("unaligned length");
        assert!(matches!(err, ScrubError::Misaligned(_)));
    }

    #[test]
    fn transfer_past_the_end_is_short() {
        let mut dev = MemBlockDevice::new(1024, 512);
        dev.seek_to(ByteOffset(1024)).expect("seek");
        assert_eq!(dev.write(&[1_u8; 512]).expect("write"), 0);
    }

    #[test]
    fn clones_share_storage() {
        let dev = MemBlockDevice::new(1024, 512);
        let mut handle = dev.clone();
        handle.seek_to(ByteOffset(512)).expect("seek");
        handle.write(&[9_u8; 512]).expect("write");
        assert_eq!(dev.block(BlockNumber(1)), Some(vec![9_u8; 512]));
    }

    #[test]
    fn faulty_device_injects_at_chosen_block() {
        let mut dev = FaultyBlockDevice::new(
            MemBlockDevice::new(4096, 512),
            FaultPlan {
                fail_write: vec![BlockNumber(3)],
                corrupt_write: vec![BlockNumber(5)],
                ..FaultPlan::default()
            },
        );

        dev.seek_to(ByteOffset(512)).expect("seek");
        assert_eq!(dev.write(&[1_u8; 512]).expect("write"), 512);

        dev.seek_to(ByteOffset(3 * 512)).expect("seek");
        let err = dev.write(&[1_u8; 512]).expect_err("injected");
        assert_eq!(err.to_errno(), libc::EIO);

        dev.seek_to(ByteOffset(5 * 512)).expect("seek");
        dev.write(&[1_u8; 512]).expect("write");
        let stored = dev.inner().block(BlockNumber(5)).expect("block");
        assert_eq!(stored[0], !1_u8);
        assert!(stored[1..].iter().all(|&b| b == 1));
    }

    #[test]
    fn misplaced_seek_reports_wrong_position() {
        let mut dev = FaultyBlockDevice::new(
            MemBlockDevice::new(4096, 512),
            FaultPlan {
                misplace_seek: vec![BlockNumber(2)],
                ..FaultPlan::default()
            },
        );
        assert_eq!(dev.seek_to(ByteOffset(1024)).expect("seek"), 1536);
    }
}
