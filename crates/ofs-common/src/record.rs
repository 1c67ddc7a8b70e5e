//! Result records and their stable byte layout.
//!
//! A [`ResultRecord`] describes one open file observed during a query. The
//! field order is part of the caller-facing contract:
//!
//! ```text
//! pid:u32 | uid:u32 | owner:u32 | permissions:u16 | name:[u8; 64] | fsize:u64 | inode_no:u64
//! ```
//!
//! Records are encoded little-endian with no padding, [`RECORD_SIZE`] bytes each.

use serde::{Serialize, Serializer};

/// Size of the fixed name field, including the terminating NUL.
pub const NAME_LEN: usize = 64;

/// Longest path (in bytes) a record or a name query can hold.
pub const MAX_PATH_BYTES: usize = NAME_LEN - 1;

/// Encoded size of one record.
pub const RECORD_SIZE: usize = 4 + 4 + 4 + 2 + NAME_LEN + 8 + 8;

/// One open file observed during a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    /// Process holding the file open.
    pub pid: u32,
    /// Real user id of that process.
    pub uid: u32,
    /// User id owning the file (0 if unavailable).
    pub owner: u32,
    /// File type and permission bits (0 if unavailable).
    pub permissions: u16,
    /// NUL-padded path; empty if the path was unresolvable or too long.
    #[serde(serialize_with = "serialize_name")]
    pub name: [u8; NAME_LEN],
    /// File size in bytes (0 if unavailable).
    pub fsize: u64,
    /// Inode number (0 if unavailable).
    pub inode_no: u64,
}

impl Default for ResultRecord {
    fn default() -> Self {
        Self {
            pid: 0,
            uid: 0,
            owner: 0,
            permissions: 0,
            name: [0; NAME_LEN],
            fsize: 0,
            inode_no: 0,
        }
    }
}

impl ResultRecord {
    /// Create a record for `pid`/`uid` with every file field zeroed.
    pub fn new(pid: u32, uid: u32) -> Self {
        Self {
            pid,
            uid,
            ..Self::default()
        }
    }

    /// Store `path` in the name field.
    ///
    /// Paths longer than [`MAX_PATH_BYTES`] do not fit and leave the name
    /// empty, the same as an unresolvable path. Returns whether it fit.
    pub fn set_name(&mut self, path: &[u8]) -> bool {
        self.name = [0; NAME_LEN];
        if path.len() > MAX_PATH_BYTES {
            return false;
        }
        self.name[..path.len()].copy_from_slice(path);
        true
    }

    /// Builder form of [`set_name`](Self::set_name).
    pub fn with_name(mut self, path: &[u8]) -> Self {
        self.set_name(path);
        self
    }

    /// Path bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..end]
    }

    /// Path as text, with invalid UTF-8 replaced.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// Encode into the stable layout.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&self.pid.to_le_bytes());
        put(&self.uid.to_le_bytes());
        put(&self.owner.to_le_bytes());
        put(&self.permissions.to_le_bytes());
        put(&self.name);
        put(&self.fsize.to_le_bytes());
        put(&self.inode_no.to_le_bytes());
        out
    }

    /// Decode one record from the stable layout.
    ///
    /// Returns `None` if `bytes` is shorter than [`RECORD_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..RECORD_SIZE)?;
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[14..14 + NAME_LEN]);
        let tail = 14 + NAME_LEN;
        Some(Self {
            pid: u32::from_le_bytes(bytes[0..4].try_into().ok()?),
            uid: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            owner: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
            permissions: u16::from_le_bytes(bytes[12..14].try_into().ok()?),
            name,
            fsize: u64::from_le_bytes(bytes[tail..tail + 8].try_into().ok()?),
            inode_no: u64::from_le_bytes(bytes[tail + 8..tail + 16].try_into().ok()?),
        })
    }
}

fn serialize_name<S: Serializer>(name: &[u8; NAME_LEN], serializer: S) -> Result<S::Ok, S::Error> {
    let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    serializer.serialize_str(&String::from_utf8_lossy(&name[..end]))
}
