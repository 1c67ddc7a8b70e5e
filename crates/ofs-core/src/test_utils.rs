//! Test utilities for ofs-core.
//!
//! - Result assertion macros
//! - [`ProcTree`]: a synthetic proc filesystem in a temp directory
//! - Live /proc availability check

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

// ============================================================================
// Macros
// ============================================================================

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that an expression matches an error pattern.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr, $pat:pat) => {
        match $expr {
            Err($pat) => {}
            Err(e) => panic!("Unexpected error: {:?}", e),
            Ok(_) => panic!("Expected Err({}), got Ok", stringify!($pat)),
        }
    };
}

// ============================================================================
// Live /proc
// ============================================================================

/// Whether this host exposes a readable /proc with per-process fd links.
pub fn proc_available() -> bool {
    Path::new("/proc/self/fd").is_dir()
}

// ============================================================================
// Synthetic proc tree
// ============================================================================

/// A directory laid out like /proc, for pointing `ProcFs` at.
///
/// Open files are real files under a sibling `files/` directory, linked
/// from `<pid>/fd/<n>` so that `stat` through the link works.
pub struct ProcTree {
    dir: tempfile::TempDir,
}

impl ProcTree {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("proc"))?;
        fs::create_dir(dir.path().join("files"))?;
        Ok(Self { dir })
    }

    /// Root to hand to `ProcFs::new`.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    /// Add a process with real uid `uid` and no open files.
    pub fn add_process(&self, pid: u32, uid: u32) -> io::Result<()> {
        let proc_dir = self.root().join(pid.to_string());
        fs::create_dir_all(proc_dir.join("fd"))?;
        fs::write(
            proc_dir.join("status"),
            format!(
                "Name:\tsynthetic\nState:\tS (sleeping)\nPid:\t{pid}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\nGid:\t0\t0\t0\t0\n"
            ),
        )
    }

    /// Create `files/<name>` holding `contents` and open it as descriptor
    /// `fd` of `pid`. Returns the file's path.
    pub fn add_open_file(&self, pid: u32, fd: u32, name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join("files").join(name);
        if !path.exists() {
            fs::write(&path, contents)?;
        }
        symlink(&path, self.fd_path(pid, fd))?;
        Ok(path)
    }

    /// Descriptor `fd` of `pid` pointing at a target that does not exist.
    pub fn add_dangling_fd(&self, pid: u32, fd: u32, target: &str) -> io::Result<()> {
        symlink(target, self.fd_path(pid, fd))
    }

    /// Remove a process, as if it exited.
    pub fn remove_process(&self, pid: u32) -> io::Result<()> {
        fs::remove_dir_all(self.root().join(pid.to_string()))
    }

    fn fd_path(&self, pid: u32, fd: u32) -> PathBuf {
        self.root().join(pid.to_string()).join("fd").join(fd.to_string())
    }
}
