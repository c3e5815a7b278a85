#![forbid(unsafe_code)]
//! Value types shared across the blkscrub workspace.
//!
//! Everything here is plain data: unit-carrying newtypes for block indices
//! and byte offsets, the immutable device [`Geometry`], and the session
//! configuration enums. No I/O happens in this crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Blocks between two progress reports when the caller does not choose one.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 4096;

/// Index of a block on the device under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u64);

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Absolute byte offset on the device.
///
/// Unit-carrying wrapper so block indices and byte positions cannot be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    /// Add a byte count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seed of the pseudo-random pattern stream.
///
/// Captured once per session and replayed for the verify pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(pub u64);

impl Seed {
    /// Seed derived from the wall clock (whole seconds since the Unix epoch).
    #[must_use]
    pub fn from_clock() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs()),
        )
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the per-block test pattern is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    /// `byte[i] = i mod 256`, identical for every block.
    #[default]
    Fixed,
    /// Independent draw from the seeded stream for every block.
    Random,
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Rejected geometry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("block size is zero")]
    ZeroBlockSize,
    #[error("block size {0} does not fit in memory on this platform")]
    BlockSizeTooLarge(u64),
}

/// Immutable size description of the device under test.
///
/// `block_count = total_bytes / block_size`, truncated: a trailing partial
/// block is never exercised.
///
/// Deserialization goes through [`Geometry::new`]; a serialized
/// `block_count` is ignored and recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry")]
pub struct Geometry {
    total_bytes: u64,
    block_size: u64,
    block_count: u64,
}

#[derive(Deserialize)]
struct RawGeometry {
    total_bytes: u64,
    block_size: u64,
}

impl TryFrom<RawGeometry> for Geometry {
    type Error = GeometryError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        Self::new(raw.total_bytes, raw.block_size)
    }
}

impl Geometry {
    pub fn new(total_bytes: u64, block_size: u64) -> Result<Self, GeometryError> {
        if block_size == 0 {
            return Err(GeometryError::ZeroBlockSize);
        }
        if usize::try_from(block_size).is_err() {
            return Err(GeometryError::BlockSizeTooLarge(block_size));
        }
        Ok(Self {
            total_bytes,
            block_size,
            block_count: total_bytes / block_size,
        })
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    #[must_use]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Block size as a buffer length.
    #[must_use]
    pub fn block_len(&self) -> usize {
        // Checked in `new`.
        usize::try_from(self.block_size).unwrap_or(usize::MAX)
    }

    /// Bytes past the last whole block.
    #[must_use]
    pub fn trailing_bytes(&self) -> u64 {
        self.total_bytes % self.block_size
    }

    /// Byte offset of `block`, or `None` if the block lies past the end.
    #[must_use]
    pub fn offset_of(&self, block: BlockNumber) -> Option<ByteOffset> {
        if block.0 >= self.block_count {
            return None;
        }
        block.0.checked_mul(self.block_size).map(ByteOffset)
    }

    /// Every testable block, ascending.
    pub fn blocks(&self) -> impl Iterator<Item = BlockNumber> + use<> {
        (0..self.block_count).map(BlockNumber)
    }

    #[must_use]
    pub fn is_last(&self, block: BlockNumber) -> bool {
        self.block_count > 0 && block.0 == self.block_count - 1
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes, block_size={}, block_count={}",
            self.total_bytes, self.block_size, self.block_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn geometry_truncates_partial_block() {
        let geo = Geometry::new(4096 + 100, 512).expect("geometry");
        assert_eq!(geo.block_count(), 8);
        assert_eq!(geo.trailing_bytes(), 100);
        assert_eq!(geo.offset_of(BlockNumber(7)), Some(ByteOffset(3584)));
        assert_eq!(geo.offset_of(BlockNumber(8)), None);
    }

    #[test]
    fn geometry_rejects_zero_block_size() {
        assert_eq!(
            Geometry::new(4096, 0).expect_err("zero block size"),
            GeometryError::ZeroBlockSize
        );
    }

    #[test]
    fn geometry_smaller_than_one_block_has_no_blocks() {
        let geo = Geometry::new(100, 512).expect("geometry");
        assert_eq!(geo.block_count(), 0);
        assert_eq!(geo.blocks().count(), 0);
        assert!(!geo.is_last(BlockNumber(0)));
    }

    #[test]
    fn blocks_iterate_in_ascending_order() {
        let geo = Geometry::new(4096, 1024).expect("geometry");
        let blocks: Vec<u64> = geo.blocks().map(|b| b.0).collect();
        assert_eq!(blocks, vec![0, 1, 2, 3]);
        assert!(geo.is_last(BlockNumber(3)));
        assert!(!geo.is_last(BlockNumber(2)));
    }

    #[test]
    fn fill_method_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FillMethod::Random).expect("serialize"),
            "\"random\""
        );
        assert_eq!(FillMethod::default(), FillMethod::Fixed);
        assert_eq!(FillMethod::Fixed.to_string(), "fixed");
    }

    #[test]
    fn deserialized_geometry_is_validated() {
        let geo: Geometry =
            serde_json::from_str(r#"{"total_bytes":4196,"block_size":512,"block_count":99}"#)
                .expect("valid geometry");
        assert_eq!(geo, Geometry::new(4196, 512).expect("geometry"));
        assert_eq!(geo.block_count(), 8);

        let err = serde_json::from_str::<Geometry>(r#"{"total_bytes":4096,"block_size":0}"#)
            .expect_err("zero block size");
        assert!(err.to_string().contains("block size is zero"), "{err}");
    }

    #[test]
    fn byte_offset_checked_add_detects_overflow() {
        assert_eq!(ByteOffset(10).checked_add(5), Some(ByteOffset(15)));
        assert_eq!(ByteOffset(u64::MAX).checked_add(1), None);
    }

    proptest! {
        #[test]
        fn whole_blocks_never_exceed_capacity(
            total in any::<u64>(),
            block_size in 1_u64..=(1 << 20),
        ) {
            let geo = Geometry::new(total, block_size).expect("geometry");
            prop_assert!(geo.block_count() * block_size <= total);
            prop_assert!(geo.trailing_bytes() < block_size);
            if geo.block_count() > 0 {
                let last = BlockNumber(geo.block_count() - 1);
                let end = geo.offset_of(last).expect("offset").0 + block_size;
                prop_assert!(end <= total);
                prop_assert!(geo.is_last(last));
            }
            prop_assert_eq!(geo.offset_of(BlockNumber(geo.block_count())), None);
        }
    }
}
