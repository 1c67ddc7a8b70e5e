//! Query engine.
//!
//! Walks the candidates of a query through a [`ProcessDirectory`], builds one
//! [`ResultRecord`] per open file, and appends the records the query keeps to
//! a [`ResultBuffer`]. Building the record, testing it, and appending it are
//! separate steps, so a rejected file never occupies a slot.
//!
//! Collection stops as soon as the buffer is full. Results beyond capacity are
//! dropped in adapter order and only show up as `truncated` in the summary.

use crate::adapter::{DirectoryError, FileMetadata, ProcessDirectory};
use crate::buffer::ResultBuffer;
use crate::filter;
use ofs_common::{Query, Result, ResultRecord};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What one `execute` call did.
#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    /// Buffer generation holding this query's results.
    pub generation: u64,
    pub query: Query,
    /// Start time (RFC 3339).
    pub started_at: String,
    pub duration_ms: u64,
    /// Candidates whose open files were inspected.
    pub candidates_visited: usize,
    /// Candidates that vanished or denied access mid-query.
    pub candidates_skipped: usize,
    /// Listed descriptors that were closed before they could be inspected.
    pub files_skipped: usize,
    /// Records stored in the buffer.
    pub records: usize,
    /// The buffer filled up or the scan budget ran out, so matches may be missing.
    pub truncated: bool,
}

/// Runs queries against one process directory.
#[derive(Debug)]
pub struct QueryEngine<D> {
    directory: D,
    scan_budget: Option<Duration>,
}

impl<D: ProcessDirectory> QueryEngine<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            scan_budget: None,
        }
    }

    /// Stop visiting candidates once a query has run for `budget`.
    pub fn with_scan_budget(mut self, budget: Option<Duration>) -> Self {
        self.scan_budget = budget;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Run `query`, replacing the contents of `buffer`.
    ///
    /// An invalid argument is rejected before the buffer is touched. Once the
    /// query is accepted the buffer is reset, so a later listing failure
    /// leaves an empty generation instead of stale results.
    pub fn execute(&self, query: &Query, buffer: &mut ResultBuffer) -> Result<QuerySummary> {
        query.validate()?;

        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        buffer.reset();
        debug!(query = %query, generation = buffer.generation(), "query started");

        let candidates = filter::candidates(query, &self.directory)?;

        let mut visited = 0;
        let mut skipped = 0;
        let mut files_skipped = 0;
        let mut budget_exceeded = false;

        'candidates: for (index, process) in candidates.iter().enumerate() {
            if buffer.is_full() {
                break;
            }
            if let Some(budget) = self.scan_budget {
                if start.elapsed() >= budget {
                    warn!(
                        budget_ms = budget.as_millis() as u64,
                        visited,
                        remaining = candidates.len() - index,
                        "scan budget exceeded, stopping"
                    );
                    budget_exceeded = true;
                    break;
                }
            }

            let uid = match self.directory.process_uid(process) {
                Ok(uid) => uid,
                Err(err) => {
                    skip(process.pid, &err);
                    skipped += 1;
                    continue;
                }
            };
            if !filter::process_matches(query, uid) {
                continue;
            }

            let files = match self.directory.open_files(process) {
                Ok(files) => files,
                Err(err) => {
                    skip(process.pid, &err);
                    skipped += 1;
                    continue;
                }
            };
            visited += 1;

            for file in &files {
                let metadata = match self.directory.file_metadata(file) {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        debug!(pid = file.pid, fd = file.fd, error = %err, "file skipped");
                        files_skipped += 1;
                        continue;
                    }
                };
                let record = build_record(process.pid, uid, &metadata);
                if !filter::keep(query, &record, &metadata) {
                    continue;
                }
                buffer.append(record);
                if buffer.is_full() {
                    debug!(capacity = buffer.capacity(), pid = process.pid, "buffer full");
                    break 'candidates;
                }
            }
        }

        let summary = QuerySummary {
            generation: buffer.generation(),
            query: query.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            candidates_visited: visited,
            candidates_skipped: skipped,
            files_skipped,
            records: buffer.len(),
            truncated: buffer.is_full() || budget_exceeded,
        };

        info!(
            query = %summary.query,
            generation = summary.generation,
            records = summary.records,
            visited = summary.candidates_visited,
            skipped = summary.candidates_skipped,
            files_skipped = summary.files_skipped,
            truncated = summary.truncated,
            duration_ms = summary.duration_ms,
            "query finished"
        );

        Ok(summary)
    }
}

fn skip(pid: u32, err: &DirectoryError) {
    debug!(pid, error = %err, "candidate skipped");
}

/// Build the record for one open file. Missing metadata becomes zero.
fn build_record(pid: u32, uid: u32, metadata: &FileMetadata) -> ResultRecord {
    let mut record = ResultRecord {
        pid,
        uid,
        owner: metadata.owner.unwrap_or(0),
        // st_mode type and permission bits fit in 16 bits
        permissions: metadata.permissions.map(|mode| mode as u16).unwrap_or(0),
        fsize: metadata.size.unwrap_or(0),
        inode_no: metadata.inode.unwrap_or(0),
        ..ResultRecord::default()
    };
    if let Some(path) = &metadata.path {
        record.set_name(path);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_process::MockProcessDirectory;
    use ofs_common::Error;

    #[test]
    fn test_build_record_full_metadata() {
        let meta = FileMetadata {
            owner: Some(1000),
            permissions: Some(0o100644),
            size: Some(12),
            inode: Some(99),
            path: Some(b"/tmp/x".to_vec()),
        };
        let rec = build_record(5, 6, &meta);
        assert_eq!(rec.pid, 5);
        assert_eq!(rec.uid, 6);
        assert_eq!(rec.owner, 1000);
        assert_eq!(rec.permissions, 0o100644);
        assert_eq!(rec.fsize, 12);
        assert_eq!(rec.inode_no, 99);
        assert_eq!(rec.name_bytes(), b"/tmp/x");
    }

    #[test]
    fn test_build_record_missing_metadata() {
        let rec = build_record(5, 6, &FileMetadata::default());
        assert_eq!(rec, ResultRecord::new(5, 6));
    }

    #[test]
    fn test_build_record_long_path_clears_name() {
        let meta = FileMetadata {
            path: Some(vec![b'a'; 80]),
            ..FileMetadata::default()
        };
        assert!(build_record(1, 1, &meta).name_bytes().is_empty());
    }

    #[test]
    fn test_invalid_argument_keeps_previous_results() {
        let dir = MockProcessDirectory::builder()
            .process(1, 0)
            .file("/a", 0)
            .build();
        let engine = QueryEngine::new(dir);
        let mut buffer = ResultBuffer::default();

        engine.execute(&Query::ByPid(1), &mut buffer).unwrap();
        let err = engine
            .execute(&Query::ByName(Vec::new()), &mut buffer)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(buffer.generation(), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_listing_failure_resets_buffer() {
        let dir = MockProcessDirectory::builder()
            .process(1, 0)
            .file("/a", 0)
            .build();
        let engine = QueryEngine::new(dir);
        let mut buffer = ResultBuffer::default();
        engine.execute(&Query::ByUid(0), &mut buffer).unwrap();

        engine.directory().fail_listing(true);
        let err = engine.execute(&Query::ByUid(0), &mut buffer).unwrap_err();

        assert!(matches!(err, Error::IoFailure(_)));
        assert_eq!(buffer.generation(), 2);
        assert!(buffer.drain(10).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_flag() {
        let dir = MockProcessDirectory::builder()
            .process(1, 0)
            .file("/a", 0)
            .file("/b", 0)
            .file("/c", 0)
            .build();
        let engine = QueryEngine::new(dir);

        let mut small = ResultBuffer::with_capacity(2);
        let summary = engine.execute(&Query::ByPid(1), &mut small).unwrap();
        assert!(summary.truncated);
        assert_eq!(summary.records, 2);

        let mut large = ResultBuffer::with_capacity(8);
        let summary = engine.execute(&Query::ByPid(1), &mut large).unwrap();
        assert!(!summary.truncated);
        assert_eq!(summary.records, 3);
    }

    #[test]
    fn test_closed_descriptor_is_skipped() {
        let dir = MockProcessDirectory::builder()
            .process(1, 0)
            .file("/a", 0)
            .closing_file("/b", 0)
            .file("/c", 0)
            .build();
        let engine = QueryEngine::new(dir);
        let mut buffer = ResultBuffer::default();

        let summary = engine.execute(&Query::ByPid(1), &mut buffer).unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.candidates_skipped, 0);
        let names: Vec<String> = buffer
            .drain(10)
            .unwrap()
            .iter()
            .map(|r| r.name_lossy())
            .collect();
        assert_eq!(names, vec!["/a", "/c"]);
    }

    #[test]
    fn test_zero_scan_budget_stops_immediately() {
        let dir = MockProcessDirectory::builder()
            .process(1, 0)
            .file("/a", 0)
            .build();
        let engine = QueryEngine::new(dir).with_scan_budget(Some(Duration::ZERO));
        let mut buffer = ResultBuffer::default();

        let summary = engine.execute(&Query::ByUid(0), &mut buffer).unwrap();

        assert!(summary.truncated);
        assert_eq!(summary.candidates_visited, 0);
    }
}
