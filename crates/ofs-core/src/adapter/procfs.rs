//! Process directory backed by the /proc filesystem (Linux-only).
//!
//! # Layout used
//! - `<root>/<pid>/` - one numeric directory per process
//! - `<root>/<pid>/status` - `Uid:` line gives the real uid
//! - `<root>/<pid>/fd/<n>` - symlink per open descriptor; `stat` through it
//!   reaches the open file, `readlink` gives its path
//!
//! The root is configurable so tests can point it at a synthetic tree.

use super::{DirectoryError, FileHandle, FileMetadata, ProcessDirectory, ProcessHandle};
use std::fs;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Default proc filesystem mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// [`ProcessDirectory`] reading a proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn process_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn fd_link(&self, file: &FileHandle) -> PathBuf {
        self.process_dir(file.pid)
            .join("fd")
            .join(file.fd.to_string())
    }
}

impl ProcessDirectory for ProcFs {
    fn list_processes(&self) -> Result<Vec<ProcessHandle>, DirectoryError> {
        let mut pids = Vec::new();

        for entry in fs::read_dir(&self.root)?.flatten() {
            // Only numeric directories are processes
            if let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) {
                pids.push(pid);
            }
        }

        pids.sort_unstable();
        Ok(pids.into_iter().map(|pid| ProcessHandle { pid }).collect())
    }

    fn process_by_pid(&self, pid: u32) -> Option<ProcessHandle> {
        self.process_dir(pid)
            .is_dir()
            .then_some(ProcessHandle { pid })
    }

    fn process_uid(&self, process: &ProcessHandle) -> Result<u32, DirectoryError> {
        let status = fs::read_to_string(self.process_dir(process.pid).join("status"))
            .map_err(|e| classify(e, process.pid))?;

        parse_uid_from_status(&status).ok_or_else(|| {
            DirectoryError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no Uid line in status of process {}", process.pid),
            ))
        })
    }

    fn open_files(&self, process: &ProcessHandle) -> Result<Vec<FileHandle>, DirectoryError> {
        let entries = fs::read_dir(self.process_dir(process.pid).join("fd"))
            .map_err(|e| classify(e, process.pid))?;

        let mut fds: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse().ok()))
            .collect();
        fds.sort_unstable();

        Ok(fds
            .into_iter()
            .map(|fd| FileHandle {
                pid: process.pid,
                fd,
            })
            .collect())
    }

    fn file_metadata(&self, file: &FileHandle) -> Result<FileMetadata, DirectoryError> {
        let link = self.fd_link(file);
        let mut meta = FileMetadata::default();

        // stat follows the fd link to the open file itself
        if let Ok(stat) = fs::metadata(&link) {
            meta.owner = Some(stat.uid());
            meta.permissions = Some(stat.mode());
            meta.size = Some(stat.size());
            meta.inode = Some(stat.ino());
        }

        // The link itself exists for as long as the descriptor is open, so a
        // missing link means the stat above may describe nothing.
        match fs::read_link(&link) {
            Ok(target) => meta.path = Some(target.into_os_string().into_vec()),
            Err(err) if is_gone(&err) => {
                return Err(DirectoryError::Closed {
                    pid: file.pid,
                    fd: file.fd,
                })
            }
            Err(_) => {}
        }

        Ok(meta)
    }
}

/// Map an I/O error on a process entry to the adapter taxonomy.
fn classify(err: io::Error, pid: u32) -> DirectoryError {
    if is_gone(&err) {
        return DirectoryError::Vanished { pid };
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => DirectoryError::PermissionDenied { pid },
        _ => DirectoryError::Io(err),
    }
}

/// The entry disappeared. ESRCH shows up when the task exits between lookup
/// and read.
fn is_gone(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(libc::ESRCH)
}

/// Parse the real UID from /proc/[pid]/status.
///
/// Format: `Uid:\t<real>\t<effective>\t<saved>\t<fs>`
fn parse_uid_from_status(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_parse_uid_from_status() {
        let content = "Name:\tbash\nUmask:\t0022\nState:\tS (sleeping)\nPid:\t1234\nUid:\t1000\t1001\t1002\t1003\nGid:\t1000\t1000\t1000\t1000\n";
        assert_eq!(parse_uid_from_status(content), Some(1000));
    }

    #[test]
    fn test_parse_uid_missing() {
        assert_eq!(parse_uid_from_status("Name:\tbash\n"), None);
        assert_eq!(parse_uid_from_status("Uid:\n"), None);
    }

    #[test]
    fn test_classify_errors() {
        let vanished = classify(io::Error::from(io::ErrorKind::NotFound), 7);
        assert!(matches!(vanished, DirectoryError::Vanished { pid: 7 }));

        let denied = classify(io::Error::from(io::ErrorKind::PermissionDenied), 7);
        assert!(matches!(denied, DirectoryError::PermissionDenied { pid: 7 }));

        let esrch = classify(io::Error::from_raw_os_error(libc::ESRCH), 7);
        assert!(matches!(esrch, DirectoryError::Vanished { pid: 7 }));
    }

    #[test]
    fn test_synthetic_tree() {
        let root = tempfile::tempdir().unwrap();
        let data = tempfile::NamedTempFile::new().unwrap();
        fs::write(data.path(), b"hello").unwrap();

        let proc_dir = root.path().join("42");
        fs::create_dir_all(proc_dir.join("fd")).unwrap();
        fs::write(proc_dir.join("status"), "Name:\tx\nUid:\t7\t7\t7\t7\n").unwrap();
        symlink(data.path(), proc_dir.join("fd").join("3")).unwrap();
        symlink("/nonexistent/target", proc_dir.join("fd").join("10")).unwrap();
        fs::create_dir_all(root.path().join("self")).unwrap();

        let procfs = ProcFs::new(root.path());

        let procs = procfs.list_processes().unwrap();
        assert_eq!(procs, vec![ProcessHandle { pid: 42 }]);
        assert!(procfs.process_by_pid(42).is_some());
        assert!(procfs.process_by_pid(43).is_none());

        let handle = ProcessHandle { pid: 42 };
        assert_eq!(procfs.process_uid(&handle).unwrap(), 7);

        let files = procfs.open_files(&handle).unwrap();
        assert_eq!(files.iter().map(|f| f.fd).collect::<Vec<_>>(), vec![3, 10]);

        let meta = procfs.file_metadata(&files[0]).unwrap();
        assert_eq!(meta.size, Some(5));
        assert!(meta.inode.is_some());
        assert_eq!(
            meta.path.as_deref(),
            Some(data.path().as_os_str().as_encoded_bytes())
        );

        let dangling = procfs.file_metadata(&files[1]).unwrap();
        assert_eq!(dangling.owner, None);
        assert_eq!(dangling.path.as_deref(), Some(&b"/nonexistent/target"[..]));
    }

    #[test]
    fn test_closed_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let fd_dir = root.path().join("5").join("fd");
        fs::create_dir_all(&fd_dir).unwrap();
        symlink("/dev/null", fd_dir.join("0")).unwrap();
        symlink("/dev/null", fd_dir.join("1")).unwrap();

        let procfs = ProcFs::new(root.path());
        let files = procfs.open_files(&ProcessHandle { pid: 5 }).unwrap();
        assert_eq!(files.len(), 2);

        // fd 1 is closed after listing
        fs::remove_file(fd_dir.join("1")).unwrap();

        assert!(procfs.file_metadata(&files[0]).is_ok());
        let err = procfs.file_metadata(&files[1]).unwrap_err();
        assert!(matches!(err, DirectoryError::Closed { pid: 5, fd: 1 }));
    }

    #[test]
    fn test_missing_process_is_vanished() {
        let root = tempfile::tempdir().unwrap();
        let procfs = ProcFs::new(root.path());
        let err = procfs.open_files(&ProcessHandle { pid: 99 }).unwrap_err();
        assert!(matches!(err, DirectoryError::Vanished { pid: 99 }));
    }

    #[test]
    fn test_live_self_fds() {
        if !Path::new("/proc/self/fd").exists() {
            return;
        }
        let procfs = ProcFs::default();
        let me = procfs
            .process_by_pid(std::process::id())
            .expect("own process visible");
        let files = procfs.open_files(&me).expect("own fds readable");
        assert!(!files.is_empty());

        // The handle read_dir held while listing is closed by now
        for file in &files {
            if let Ok(meta) = procfs.file_metadata(file) {
                assert!(meta.path.is_some(), "fd {} has no link target", file.fd);
            }
        }
    }
}
