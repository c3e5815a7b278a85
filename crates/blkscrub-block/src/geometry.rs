//! Block geometry resolution.

use crate::BlockDevice;
use blkscrub_error::{Result, ScrubError};
use blkscrub_types::Geometry;
use tracing::{debug, warn};

/// Query capacity and physical block size and derive the block count.
///
/// A failed capacity query is fatal ([`ScrubError::GeometryUnavailable`]).
/// A failed block-size query is tolerated and treated as zero, which is then
/// rejected as [`ScrubError::InvalidGeometry`] before anything divides by it.
pub fn resolve_geometry<D: BlockDevice + ?Sized>(device: &D) -> Result<Geometry> {
    let total_bytes = device.capacity_bytes().map_err(|err| match err {
        ScrubError::Io(source) => ScrubError::GeometryUnavailable { source },
        other => other,
    })?;

    let block_size = device.physical_block_size().unwrap_or_else(|err| {
        warn!(error = %err, "physical block size query failed");
        0
    });

    let geometry = Geometry::new(total_bytes, block_size)
        .map_err(|err| ScrubError::InvalidGeometry(err.to_string()))?;
    if geometry.trailing_bytes() != 0 {
        debug!(
            trailing_bytes = geometry.trailing_bytes(),
            "capacity is not a whole number of blocks; trailing bytes are not tested"
        );
    }
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{FaultPlan, FaultyBlockDevice, MemBlockDevice};

    #[test]
    fn resolves_capacity_and_block_count() {
        let dev = MemBlockDevice::new(4096, 512);
        let geo = resolve_geometry(&dev).expect("geometry");
        assert_eq!(geo.total_bytes(), 4096);
        assert_eq!(geo.block_size(), 512);
        assert_eq!(geo.block_count(), 8);
    }

    #[test]
    fn capacity_failure_is_geometry_unavailable() {
        let dev = FaultyBlockDevice::new(
            MemBlockDevice::new(4096, 512),
            FaultPlan {
                fail_capacity: true,
                ..FaultPlan::default()
            },
        );
        let err = resolve_geometry(&dev).expect_err("capacity failure");
        assert!(matches!(err, ScrubError::GeometryUnavailable { .. }));
    }

    #[test]
    fn block_size_failure_falls_back_to_zero_and_is_rejected() {
        let dev = FaultyBlockDevice::new(
            MemBlockDevice::new(4096, 512),
            FaultPlan {
                fail_block_size: true,
                ..FaultPlan::default()
            },
        );
        let err = resolve_geometry(&dev).expect_err("zero block size");
        assert!(matches!(err, ScrubError::InvalidGeometry(_)));
    }

    #[test]
    fn partial_trailing_block_is_truncated() {
        let dev = MemBlockDevice::new(4096 + 300, 512);
        let geo = resolve_geometry(&dev).expect("geometry");
        assert_eq!(geo.block_count(), 8);
        assert_eq!(geo.trailing_bytes(), 300);
    }
}
