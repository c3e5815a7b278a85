//! File-descriptor backed block device.

use crate::BlockDevice;
use blkscrub_error::Result;
use blkscrub_types::ByteOffset;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How the device node was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Page cache bypassed (`O_DIRECT`).
    Direct,
    /// Regular buffered I/O. Only used for image files on filesystems that
    /// refuse `O_DIRECT`.
    Buffered,
}

/// Read/write handle on a block device node or a regular image file.
///
/// Block devices answer the geometry queries through ioctls. Regular files
/// report their length and the filesystem's preferred I/O size instead, so
/// the engine can be pointed at an image for dry runs.
///
/// The descriptor is closed when the value is dropped.
#[derive(Debug)]
pub struct FileBlockDevice {
    file: File,
    path: PathBuf,
    mode: IoMode,
    is_block_device: bool,
}

impl FileBlockDevice {
    /// Open `path` read+write with the page cache bypassed.
    ///
    /// A regular file on a filesystem that rejects `O_DIRECT` (tmpfs, for
    /// example) is reopened in buffered mode. Block devices never fall back.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match open_with(path, IoMode::Direct) {
            Ok(dev) => Ok(dev),
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) && is_regular_file(path) => {
                warn!(
                    path = %path.display(),
                    "filesystem rejected O_DIRECT; falling back to buffered I/O"
                );
                Ok(open_with(path, IoMode::Buffered)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Open `path` read+write through the page cache.
    pub fn open_buffered(path: impl AsRef<Path>) -> Result<Self> {
        Ok(open_with(path.as_ref(), IoMode::Buffered)?)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn mode(&self) -> IoMode {
        self.mode
    }

    #[must_use]
    pub fn is_block_device(&self) -> bool {
        self.is_block_device
    }
}

fn open_with(path: &Path, mode: IoMode) -> io::Result<FileBlockDevice> {
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    apply_mode(&mut options, mode);
    let file = options.open(path)?;
    let is_block_device = file.metadata()?.file_type().is_block_device();
    debug!(path = %path.display(), ?mode, is_block_device, "opened device");
    Ok(FileBlockDevice {
        file,
        path: path.to_path_buf(),
        mode,
        is_block_device,
    })
}

#[cfg(target_os = "linux")]
fn apply_mode(options: &mut OpenOptions, mode: IoMode) {
    use std::os::unix::fs::OpenOptionsExt;
    if mode == IoMode::Direct {
        options.custom_flags(libc::O_DIRECT);
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_mode(_options: &mut OpenOptions, _mode: IoMode) {}

#[cfg(target_os = "linux")]
fn block_device_capacity(file: &File) -> io::Result<u64> {
    crate::ioctl::device_size_bytes(file)
}

#[cfg(target_os = "linux")]
fn block_device_block_size(file: &File) -> io::Result<u64> {
    crate::ioctl::physical_block_size(file)
}

#[cfg(not(target_os = "linux"))]
fn block_device_capacity(_file: &File) -> io::Result<u64> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(not(target_os = "linux"))]
fn block_device_block_size(_file: &File) -> io::Result<u64> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.file_type().is_file())
}

impl BlockDevice for FileBlockDevice {
    fn capacity_bytes(&self) -> Result<u64> {
        if self.is_block_device {
            return Ok(block_device_capacity(&self.file)?);
        }
        Ok(self.file.metadata()?.len())
    }

    fn physical_block_size(&self) -> Result<u64> {
        if self.is_block_device {
            return Ok(block_device_block_size(&self.file)?);
        }
        Ok(self.file.metadata()?.blksize())
    }

    fn seek_to(&mut self, offset: ByteOffset) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::Start(offset.0))?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
