//! Mounted-device safety check.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const MOUNT_TABLE: &str = "/proc/mounts";

/// Whether any line of `table` starts with `device`.
///
/// Prefix match on the whole line, so `/dev/sdb` also matches a mounted
/// `/dev/sdb1`: a partition in use makes the whole disk unsafe to scrub.
pub fn is_mounted_in(table: &str, device: &str) -> bool {
    !device.is_empty() && table.lines().any(|line| line.starts_with(device))
}

/// Check `device` against the live mount table.
///
/// An unreadable mount table is an error: without it there is no way to tell
/// whether the device is safe to overwrite.
pub fn is_mounted(device: &Path) -> Result<bool> {
    let table = fs::read_to_string(MOUNT_TABLE).with_context(|| {
        format!("can't read {MOUNT_TABLE}; can't determine whether device is mounted")
    })?;
    Ok(is_mounted_in(&table, &device.to_string_lossy()))
}
