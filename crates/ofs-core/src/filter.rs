//! Candidate selection and keep predicates per query kind.
//!
//! | Query        | Candidates              | Kept files                    |
//! |--------------|-------------------------|-------------------------------|
//! | `ByPid(p)`   | process `p` only        | all                           |
//! | `ByUid(u)`   | processes with uid `u`  | all                           |
//! | `ByOwner(u)` | every process           | files whose owner is `u`      |
//! | `ByName(n)`  | every process           | files whose path equals `n`   |

use crate::adapter::{DirectoryError, FileMetadata, ProcessDirectory, ProcessHandle};
use ofs_common::{Query, ResultRecord};

/// Processes the engine should visit for `query`, in adapter order.
///
/// A pid that does not exist yields no candidates rather than an error.
pub fn candidates<D: ProcessDirectory + ?Sized>(
    query: &Query,
    directory: &D,
) -> Result<Vec<ProcessHandle>, DirectoryError> {
    match query {
        Query::ByPid(pid) => Ok(directory.process_by_pid(*pid).into_iter().collect()),
        _ => directory.list_processes(),
    }
}

/// Whether a candidate with real uid `uid` contributes files at all.
pub fn process_matches(query: &Query, uid: u32) -> bool {
    match query {
        Query::ByUid(wanted) => uid == *wanted,
        _ => true,
    }
}

/// Whether a fully built record is kept.
///
/// Runs after the record's name is populated, so `ByName` compares the
/// stored name. Owner matching needs a known owner.
pub fn keep(query: &Query, record: &ResultRecord, metadata: &FileMetadata) -> bool {
    match query {
        Query::ByOwner(owner) => metadata.owner == Some(*owner),
        Query::ByName(path) => record.name_bytes() == path.as_slice(),
        Query::ByPid(_) | Query::ByUid(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(owner: Option<u32>) -> FileMetadata {
        FileMetadata {
            owner,
            ..FileMetadata::default()
        }
    }

    #[test]
    fn test_uid_filter() {
        assert!(process_matches(&Query::ByUid(7), 7));
        assert!(!process_matches(&Query::ByUid(7), 8));
        assert!(process_matches(&Query::ByOwner(7), 8));
    }

    #[test]
    fn test_owner_requires_known_owner() {
        let rec = ResultRecord::default();
        assert!(keep(&Query::ByOwner(0), &rec, &meta(Some(0))));
        assert!(!keep(&Query::ByOwner(0), &rec, &meta(None)));
        assert!(!keep(&Query::ByOwner(7), &rec, &meta(Some(8))));
    }

    #[test]
    fn test_name_is_byte_equal() {
        let rec = ResultRecord::new(1, 1).with_name(b"/tmp/a");
        assert!(keep(&Query::name("/tmp/a"), &rec, &meta(None)));
        assert!(!keep(&Query::name("/tmp/a/"), &rec, &meta(None)));
        assert!(!keep(&Query::name("/tmp/"), &rec, &meta(None)));
    }

    #[test]
    fn test_unresolved_name_never_matches() {
        let rec = ResultRecord::new(1, 1);
        assert!(!keep(&Query::name("/tmp/a"), &rec, &meta(None)));
    }
}
