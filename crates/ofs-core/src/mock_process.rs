//! Mock process directory for testing.
//!
//! Builds an in-memory [`ProcessDirectory`] with a builder, so engine and
//! control-channel tests can describe exact process/file layouts:
//!
//! ```ignore
//! use ofs_core::mock_process::MockProcessDirectory;
//!
//! let dir = MockProcessDirectory::builder()
//!     .process(42, 7)
//!     .file("/a", 7)
//!     .file("/b", 7)
//!     .process(43, 7)
//!     .vanishing()
//!     .build();
//! ```
//!
//! Processes are listed in the order they were added. Inode numbers are
//! assigned deterministically starting at [`FIRST_INODE`].

use crate::adapter::{DirectoryError, FileHandle, FileMetadata, ProcessDirectory, ProcessHandle};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Inode given to the first file added with [`MockDirectoryBuilder::file`].
pub const FIRST_INODE: u64 = 1000;

/// Regular file, rw-r--r--.
pub const REGULAR_FILE_MODE: u32 = 0o100644;

// ============================================================================
// Files
// ============================================================================

/// One open file of a mock process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockFile {
    pub metadata: FileMetadata,
    /// Closed after `open_files` listed it.
    pub closed: bool,
}

impl MockFile {
    /// A file with a resolved path and no other metadata.
    pub fn new(path: impl AsRef<[u8]>) -> Self {
        Self {
            metadata: FileMetadata {
                path: Some(path.as_ref().to_vec()),
                ..FileMetadata::default()
            },
            closed: false,
        }
    }

    /// A file whose path and metadata are all unavailable.
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: u32) -> Self {
        self.metadata.owner = Some(owner);
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.metadata.permissions = Some(mode);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.metadata.size = Some(size);
        self
    }

    pub fn inode(mut self, inode: u64) -> Self {
        self.metadata.inode = Some(inode);
        self
    }

    /// The descriptor is listed but closed before its metadata is read.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }
}

// ============================================================================
// Processes
// ============================================================================

/// How a mock process behaves when inspected after listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Normal,
    /// Exits between listing and reading its descriptors.
    Vanishes,
    /// Its status cannot be read.
    Denied,
}

#[derive(Debug, Clone)]
pub struct MockProcess {
    pub pid: u32,
    pub uid: u32,
    pub files: Vec<MockFile>,
    pub behavior: MockBehavior,
}

// ============================================================================
// Directory
// ============================================================================

/// In-memory [`ProcessDirectory`].
#[derive(Debug, Default)]
pub struct MockProcessDirectory {
    processes: Vec<MockProcess>,
    fail_listing: AtomicBool,
    metadata_lookups: AtomicUsize,
}

impl MockProcessDirectory {
    pub fn builder() -> MockDirectoryBuilder {
        MockDirectoryBuilder::default()
    }

    /// Make `list_processes` fail with an I/O error.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of `file_metadata` calls so far.
    pub fn metadata_lookups(&self) -> usize {
        self.metadata_lookups.load(Ordering::SeqCst)
    }

    pub fn processes(&self) -> &[MockProcess] {
        &self.processes
    }

    fn find(&self, pid: u32) -> Option<&MockProcess> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

impl ProcessDirectory for MockProcessDirectory {
    fn list_processes(&self) -> Result<Vec<ProcessHandle>, DirectoryError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(DirectoryError::Io(io::Error::other("mock listing failure")));
        }
        Ok(self
            .processes
            .iter()
            .map(|p| ProcessHandle { pid: p.pid })
            .collect())
    }

    fn process_by_pid(&self, pid: u32) -> Option<ProcessHandle> {
        self.find(pid).map(|p| ProcessHandle { pid: p.pid })
    }

    fn process_uid(&self, process: &ProcessHandle) -> Result<u32, DirectoryError> {
        let pid = process.pid;
        match self.find(pid) {
            None => Err(DirectoryError::Vanished { pid }),
            Some(p) if p.behavior == MockBehavior::Denied => {
                Err(DirectoryError::PermissionDenied { pid })
            }
            Some(p) => Ok(p.uid),
        }
    }

    fn open_files(&self, process: &ProcessHandle) -> Result<Vec<FileHandle>, DirectoryError> {
        let pid = process.pid;
        match self.find(pid) {
            Some(p) if p.behavior == MockBehavior::Normal => Ok((0..p.files.len())
                .map(|fd| FileHandle { pid, fd: fd as u32 })
                .collect()),
            Some(p) if p.behavior == MockBehavior::Denied => {
                Err(DirectoryError::PermissionDenied { pid })
            }
            _ => Err(DirectoryError::Vanished { pid }),
        }
    }

    fn file_metadata(&self, file: &FileHandle) -> Result<FileMetadata, DirectoryError> {
        self.metadata_lookups.fetch_add(1, Ordering::SeqCst);
        match self.find(file.pid).and_then(|p| p.files.get(file.fd as usize)) {
            Some(f) if !f.closed => Ok(f.metadata.clone()),
            _ => Err(DirectoryError::Closed {
                pid: file.pid,
                fd: file.fd,
            }),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`MockProcessDirectory`]. File methods apply to the most
/// recently added process.
#[derive(Debug)]
pub struct MockDirectoryBuilder {
    processes: Vec<MockProcess>,
    next_inode: u64,
}

impl Default for MockDirectoryBuilder {
    fn default() -> Self {
        Self {
            processes: Vec::new(),
            next_inode: FIRST_INODE,
        }
    }
}

impl MockDirectoryBuilder {
    /// Add a process with real uid `uid`.
    pub fn process(mut self, pid: u32, uid: u32) -> Self {
        self.processes.push(MockProcess {
            pid,
            uid,
            files: Vec::new(),
            behavior: MockBehavior::Normal,
        });
        self
    }

    /// Add a regular file owned by `owner`, with a fresh inode and a size
    /// equal to its path length.
    pub fn file(mut self, path: impl AsRef<[u8]>, owner: u32) -> Self {
        let path = path.as_ref();
        let inode = self.next_inode;
        self.next_inode += 1;
        let file = MockFile::new(path)
            .owner(owner)
            .mode(REGULAR_FILE_MODE)
            .size(path.len() as u64)
            .inode(inode);
        self.add_file(file)
    }

    /// Add `count` regular files `/tmp/mock-<pid>-<n>` owned by `owner`.
    pub fn files(mut self, count: usize, owner: u32) -> Self {
        let pid = self.current().pid;
        for n in 0..count {
            self = self.file(format!("/tmp/mock-{pid}-{n}"), owner);
        }
        self
    }

    pub fn add_file(mut self, file: MockFile) -> Self {
        self.current().files.push(file);
        self
    }

    /// The current process exits after it has been listed.
    pub fn vanishing(mut self) -> Self {
        self.current().behavior = MockBehavior::Vanishes;
        self
    }

    /// Add a file that is closed before its metadata is read.
    pub fn closing_file(self, path: impl AsRef<[u8]>, owner: u32) -> Self {
        let mut builder = self.file(path, owner);
        if let Some(file) = builder.current().files.last_mut() {
            file.closed = true;
        }
        builder
    }

    /// The current process cannot be inspected.
    pub fn denied(mut self) -> Self {
        self.current().behavior = MockBehavior::Denied;
        self
    }

    pub fn build(self) -> MockProcessDirectory {
        MockProcessDirectory {
            processes: self.processes,
            ..MockProcessDirectory::default()
        }
    }

    fn current(&mut self) -> &mut MockProcess {
        self.processes
            .last_mut()
            .expect("add a process before its files")
    }
}
