//! Process directory adapter.
//!
//! The engine never touches OS structures directly. It consumes a
//! [`ProcessDirectory`], which lists processes and their open files and
//! answers metadata lookups with owned snapshots:
//! - [`ProcessDirectory::open_files`] returns a copied descriptor list
//! - [`ProcessDirectory::file_metadata`] returns plain values
//!
//! Nothing an adapter hands out borrows live OS state, so a process exiting
//! mid-query can at worst turn a later call into [`DirectoryError::Vanished`],
//! and a descriptor closed after listing into [`DirectoryError::Closed`].

#[cfg(target_os = "linux")]
mod procfs;

#[cfg(target_os = "linux")]
pub use procfs::ProcFs;

use std::io;
use thiserror::Error;

/// Errors an adapter reports for a single process.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("process {pid} no longer exists")]
    Vanished { pid: u32 },

    #[error("descriptor {fd} of process {pid} was closed")]
    Closed { pid: u32, fd: u32 },

    #[error("permission denied inspecting process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<DirectoryError> for ofs_common::Error {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Io(e) => ofs_common::Error::IoFailure(e),
            DirectoryError::Vanished { .. } | DirectoryError::Closed { .. } => {
                ofs_common::Error::IoFailure(io::Error::new(io::ErrorKind::NotFound, err.to_string()))
            }
            DirectoryError::PermissionDenied { .. } => ofs_common::Error::IoFailure(
                io::Error::new(io::ErrorKind::PermissionDenied, err.to_string()),
            ),
        }
    }
}

/// A process selected for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: u32,
}

/// One open descriptor of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub pid: u32,
    pub fd: u32,
}

/// Metadata snapshot of an open file. Any field may be unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// User id owning the file.
    pub owner: Option<u32>,
    /// `st_mode`: type and permission bits.
    pub permissions: Option<u32>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Inode number.
    pub inode: Option<u64>,
    /// Resolved path bytes.
    pub path: Option<Vec<u8>>,
}

/// Source of processes and their open files.
///
/// Implementations enumerate live state, so every per-process call may fail
/// because the process exited or became inaccessible since it was listed.
pub trait ProcessDirectory: Send + Sync {
    /// Every process currently visible, in the adapter's native order.
    fn list_processes(&self) -> Result<Vec<ProcessHandle>, DirectoryError>;

    /// Look up one process; `None` if it does not exist.
    fn process_by_pid(&self, pid: u32) -> Option<ProcessHandle>;

    /// Real user id of the process.
    fn process_uid(&self, process: &ProcessHandle) -> Result<u32, DirectoryError>;

    /// Open descriptors of the process, in descriptor order.
    fn open_files(&self, process: &ProcessHandle) -> Result<Vec<FileHandle>, DirectoryError>;

    /// Metadata of one open file.
    ///
    /// Fields the adapter cannot read are `None`. A descriptor that was
    /// closed since [`open_files`](Self::open_files) listed it is
    /// [`DirectoryError::Closed`], and the engine drops it.
    fn file_metadata(&self, file: &FileHandle) -> Result<FileMetadata, DirectoryError>;
}

impl<D: ProcessDirectory + ?Sized> ProcessDirectory for Box<D> {
    fn list_processes(&self) -> Result<Vec<ProcessHandle>, DirectoryError> {
        (**self).list_processes()
    }

    fn process_by_pid(&self, pid: u32) -> Option<ProcessHandle> {
        (**self).process_by_pid(pid)
    }

    fn process_uid(&self, process: &ProcessHandle) -> Result<u32, DirectoryError> {
        (**self).process_uid(process)
    }

    fn open_files(&self, process: &ProcessHandle) -> Result<Vec<FileHandle>, DirectoryError> {
        (**self).open_files(process)
    }

    fn file_metadata(&self, file: &FileHandle) -> Result<FileMetadata, DirectoryError> {
        (**self).file_metadata(file)
    }
}
