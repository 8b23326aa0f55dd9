//! The narrow filesystem surface the MTP engine consumes.
//!
//! Volumes are addressed by a drive prefix (`"0:"`, `"1:"`, …) and paths are
//! `"0:/DIR/FILE.EXT"`. All operations are synchronous and blocking; errors
//! use a POSIX-flavoured domain that the engine maps to PTP response codes
//! at each call site.

use modular_bitfield::prelude::*;

pub mod memfs;

pub use memfs::MemFs;

/// POSIX-style error domain for adapter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("no such device")]
    NoDevice,
    #[error("no space left on device")]
    NoSpace,
    #[error("read-only file system")]
    ReadOnly,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("file exists")]
    AlreadyExists,
    #[error("directory not empty")]
    NotEmpty,
    #[error("input/output error")]
    Io,
}

pub type VfsResult<T> = Result<T, VfsError>;

/// Attribute bits of a directory entry.
#[bitfield]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    pub directory: bool,
    pub hidden: bool,
    pub system: bool,
    pub writable: bool,
    pub removable_disk: bool,
    pub flat_filesystem: bool,
    #[skip]
    __: B2,
}

/// Open mode for [`Vfs::open`].
#[bitfield]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    #[skip]
    __: B4,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self::new().with_read(true)
    }

    pub fn write_truncate() -> Self {
        Self::new().with_write(true).with_create(true).with_truncate(true)
    }

    pub fn read_write_create() -> Self {
        Self::new().with_read(true).with_write(true).with_create(true)
    }
}

/// Stat data for a file, directory, or volume root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VfsInfo {
    pub name: String,
    /// Bytes for files; bytes in use for a volume root.
    pub size: u64,
    /// Epoch seconds.
    pub created: i64,
    /// Epoch seconds.
    pub modified: i64,
    pub attrs: FileAttributes,
}

/// An open file. Dropping the handle closes it.
pub trait VfsFile: Send {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize>;
    /// Absolute seek. Seeking past the end of a writable file extends it.
    fn seek(&mut self, pos: u64) -> VfsResult<()>;
    fn size(&self) -> u64;
    fn eof(&self) -> bool;
    fn sync(&mut self) -> VfsResult<()>;
}

/// An open directory scan, yielding entries in a stable order.
pub trait VfsDir: Send {
    fn next_entry(&mut self) -> VfsResult<Option<VfsInfo>>;
}

/// The volume set exposed over MTP.
pub trait Vfs: Send {
    /// Drive prefix of the `index`-th volume (`"0:"`), or `None` past the end.
    fn volume(&self, index: usize) -> Option<String>;

    fn stat(&self, path: &str) -> VfsResult<VfsInfo>;
    fn open(&mut self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn VfsFile>>;
    fn open_dir(&mut self, path: &str) -> VfsResult<Box<dyn VfsDir>>;
    fn mkdir(&mut self, path: &str) -> VfsResult<()>;
    /// Removes a file or an empty directory.
    fn remove(&mut self, path: &str) -> VfsResult<()>;
    fn format(&mut self, volume: &str) -> VfsResult<()>;

    /// Total capacity in bytes of the volume containing `path`.
    fn fs_size(&self, path: &str) -> VfsResult<u64>;
    /// Free bytes of the volume containing `path`.
    fn fs_free(&self, path: &str) -> VfsResult<u64>;

    /// Applies timestamps and attribute bits from `info` to `path`.
    fn touch(&mut self, path: &str, info: &VfsInfo) -> VfsResult<()>;
}
