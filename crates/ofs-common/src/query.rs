//! Query kinds and the raw command encoding.
//!
//! Commands keep the numbering of the original character-device interface:
//! `_IOW(233, nr, T)` with `nr` 0..=3. Integer commands carry a native-endian
//! `u32`; the name command carries a NUL-terminated path of at most
//! [`NAME_LEN`] bytes, truncated to [`MAX_PATH_BYTES`].

use crate::error::{Error, Result};
use crate::record::{MAX_PATH_BYTES, NAME_LEN};
use serde::{Serialize, Serializer};

/// ioctl "type" byte shared by all commands.
pub const IOCTL_TYPE: u32 = 233;

const IOC_WRITE: u32 = 1;

/// Encode a write-direction ioctl number the way `_IOW` does on Linux.
pub const fn iow(nr: u32, size: usize) -> u32 {
    (IOC_WRITE << 30) | ((size as u32 & 0x3fff) << 16) | (IOCTL_TYPE << 8) | nr
}

/// Find all open files of one process.
pub const OFS_PID: u32 = iow(0, std::mem::size_of::<u32>());
/// Find all files opened by processes of one user.
pub const OFS_UID: u32 = iow(1, std::mem::size_of::<u32>());
/// Find all open files owned by one user.
pub const OFS_OWNER: u32 = iow(2, std::mem::size_of::<u32>());
/// Find all open files with a given path.
pub const OFS_NAME: u32 = iow(3, std::mem::size_of::<*const u8>());

/// The four supported commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Pid,
    Uid,
    Owner,
    Name,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [Self::Pid, Self::Uid, Self::Owner, Self::Name];

    /// Raw command number.
    pub fn raw(self) -> u32 {
        match self {
            Self::Pid => OFS_PID,
            Self::Uid => OFS_UID,
            Self::Owner => OFS_OWNER,
            Self::Name => OFS_NAME,
        }
    }

    /// Look up a raw command number.
    pub fn from_raw(command: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.raw() == command)
            .ok_or_else(|| Error::InvalidCommand(format!("{command:#x}")))
    }

    /// Symbolic name as used by the query client.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pid => "OFS_PID",
            Self::Uid => "OFS_UID",
            Self::Owner => "OFS_OWNER",
            Self::Name => "OFS_NAME",
        }
    }

    /// Decode a raw argument for this command into a [`Query`].
    ///
    /// Integer commands need at least four bytes; a shorter argument is a
    /// failed transfer. Name arguments stop at the first NUL and are cut
    /// to [`MAX_PATH_BYTES`].
    pub fn decode(self, argument: &[u8]) -> Result<Query> {
        let query = match self {
            Self::Pid => Query::ByPid(read_u32(argument)?),
            Self::Uid => Query::ByUid(read_u32(argument)?),
            Self::Owner => Query::ByOwner(read_u32(argument)?),
            Self::Name => {
                let window = &argument[..argument.len().min(NAME_LEN)];
                let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
                Query::name(&window[..end])
            }
        };
        query.validate()?;
        Ok(query)
    }
}

impl std::str::FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::InvalidCommand(s.to_string()))
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn read_u32(argument: &[u8]) -> Result<u32> {
    match argument.get(..4) {
        Some(bytes) => Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        None => Err(Error::IoFailure(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("argument is {} bytes, expected 4", argument.len()),
        ))),
    }
}

/// A single open-file query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "arg", rename_all = "snake_case")]
pub enum Query {
    /// Every open file of one process.
    ByPid(u32),
    /// Every open file of every process whose real uid matches.
    ByUid(u32),
    /// Every open file owned by the given uid.
    ByOwner(u32),
    /// Every open file whose resolved path equals the given bytes.
    ByName(#[serde(serialize_with = "serialize_path")] Vec<u8>),
}

impl Query {
    /// Build a name query, truncating the path to [`MAX_PATH_BYTES`].
    pub fn name(path: impl AsRef<[u8]>) -> Self {
        let path = path.as_ref();
        Query::ByName(path[..path.len().min(MAX_PATH_BYTES)].to_vec())
    }

    /// Command this query corresponds to.
    pub fn kind(&self) -> CommandKind {
        match self {
            Query::ByPid(_) => CommandKind::Pid,
            Query::ByUid(_) => CommandKind::Uid,
            Query::ByOwner(_) => CommandKind::Owner,
            Query::ByName(_) => CommandKind::Name,
        }
    }

    /// Check the argument before any collection starts.
    pub fn validate(&self) -> Result<()> {
        match self {
            Query::ByPid(pid) if *pid > i32::MAX as u32 => Err(Error::InvalidArgument(format!(
                "pid {pid} is outside the process id range"
            ))),
            Query::ByName(path) if path.is_empty() => {
                Err(Error::InvalidArgument("empty path".to_string()))
            }
            Query::ByName(path) if path.len() > MAX_PATH_BYTES => Err(Error::InvalidArgument(
                format!("path is {} bytes, limit is {MAX_PATH_BYTES}", path.len()),
            )),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::ByPid(pid) => write!(f, "{} {pid}", self.kind()),
            Query::ByUid(uid) | Query::ByOwner(uid) => write!(f, "{} {uid}", self.kind()),
            Query::ByName(path) => {
                write!(f, "{} {}", self.kind(), String::from_utf8_lossy(path))
            }
        }
    }
}

#[allow(clippy::ptr_arg)]
fn serialize_path<S: Serializer>(path: &Vec<u8>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_numbers_match_iow() {
        assert_eq!(OFS_PID, 0x4004_e900);
        assert_eq!(OFS_UID, 0x4004_e901);
        assert_eq!(OFS_OWNER, 0x4004_e902);
        assert_eq!(OFS_NAME & 0xffff, 0xe903);
    }

    #[test]
    fn test_from_raw_unknown() {
        let err = CommandKind::from_raw(0x1234).unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(ref c) if c == "0x1234"));
    }

    #[test]
    fn test_from_str_names() {
        assert_eq!("OFS_OWNER".parse::<CommandKind>().unwrap(), CommandKind::Owner);
        assert!(matches!(
            "ofs_owner".parse::<CommandKind>(),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_decode_integer_argument() {
        let q = CommandKind::Uid.decode(&1000u32.to_ne_bytes()).unwrap();
        assert_eq!(q, Query::ByUid(1000));
    }

    #[test]
    fn test_decode_short_integer_argument() {
        let err = CommandKind::Pid.decode(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::IoFailure(_)));
    }

    #[test]
    fn test_decode_name_stops_at_nul() {
        let q = CommandKind::Name.decode(b"/etc/hosts\0garbage").unwrap();
        assert_eq!(q, Query::ByName(b"/etc/hosts".to_vec()));
    }

    #[test]
    fn test_decode_name_truncates() {
        let long = vec![b'x'; 100];
        let Query::ByName(path) = CommandKind::Name.decode(&long).unwrap() else {
            panic!("expected name query");
        };
        assert_eq!(path.len(), MAX_PATH_BYTES);
    }

    #[test]
    fn test_validate_rejects_empty_name_and_huge_pid() {
        assert!(matches!(
            CommandKind::Name.decode(b"\0"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Query::ByPid(u32::MAX).validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_query_display() {
        assert_eq!(Query::ByPid(42).to_string(), "OFS_PID 42");
        assert_eq!(Query::name("/a").to_string(), "OFS_NAME /a");
    }
}
