//! Control channel protocol tests: session exclusivity, raw command
//! decoding, and encoded reads.

use ofs_common::{Error, ResultRecord, MAX_PATH_BYTES, OFS_NAME, OFS_OWNER, OFS_PID, OFS_UID, RECORD_SIZE};
use ofs_core::mock_process::MockProcessDirectory;
use ofs_core::{assert_err, assert_ok, OpenFileSearch};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn sample() -> OpenFileSearch<MockProcessDirectory> {
    OpenFileSearch::new(
        MockProcessDirectory::builder()
            .process(42, 7)
            .file("/a", 7)
            .file("/b", 7)
            .process(43, 1000)
            .file("/home/user/notes.txt", 1000)
            .build(),
    )
}

// ============================================================================
// Session gate
// ============================================================================

mod session_gate {
    use super::*;

    #[test]
    fn second_open_is_busy_until_close() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_err!(search.open(), Error::Busy);

        session.close();
        let again = assert_ok!(search.open());
        drop(again);
        assert!(!search.is_open());
    }

    #[test]
    fn clones_share_one_gate() {
        let search = sample();
        let other = search.clone();
        let _session = assert_ok!(search.open());
        assert_err!(other.open(), Error::Busy);
    }

    #[test]
    fn results_survive_reopen() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_ok!(session.command(OFS_PID, &42u32.to_ne_bytes()));
        assert_eq!(assert_ok!(session.read(1)).len(), 1);
        session.close();

        let session = assert_ok!(search.open());
        assert_eq!(assert_ok!(session.read(10)).len(), 1);
    }

    #[test]
    fn concurrent_open_admits_exactly_one() {
        const THREADS: usize = 16;
        let search = sample();
        let barrier = Arc::new(Barrier::new(THREADS));
        let opened = Arc::new(AtomicUsize::new(0));
        let busy = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let search = search.clone();
                let barrier = Arc::clone(&barrier);
                let opened = Arc::clone(&opened);
                let busy = Arc::clone(&busy);
                thread::spawn(move || {
                    barrier.wait();
                    match search.open() {
                        Ok(session) => {
                            opened.fetch_add(1, Ordering::SeqCst);
                            // Hold until every thread has tried
                            barrier.wait();
                            session.close();
                        }
                        Err(Error::Busy) => {
                            busy.fetch_add(1, Ordering::SeqCst);
                            barrier.wait();
                        }
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(busy.load(Ordering::SeqCst), THREADS - 1);
        assert!(!search.is_open());
    }

    #[test]
    fn session_can_move_between_threads() {
        let search = sample();
        let session = assert_ok!(search.open());
        let count = thread::spawn(move || {
            session.command(OFS_UID, &7u32.to_ne_bytes()).map(|s| s.records)
        })
        .join()
        .expect("thread panicked");
        assert_eq!(assert_ok!(count), 2);
        assert!(!search.is_open());
    }
}

// ============================================================================
// Raw commands
// ============================================================================

mod raw_commands {
    use super::*;

    #[test]
    fn unknown_command_number() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_err!(session.command(0xdead_beef, &[0; 4]), Error::InvalidCommand(_));
        // Same type byte, unused number
        assert_err!(session.command(OFS_PID + 4, &[0; 4]), Error::InvalidCommand(_));
    }

    #[test]
    fn short_integer_argument_is_io_failure() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_err!(session.command(OFS_OWNER, &[7, 0]), Error::IoFailure(_));
        assert_err!(session.command(OFS_UID, &[]), Error::IoFailure(_));
        assert_err!(session.read(1), Error::NotReady);
    }

    #[test]
    fn owner_command() {
        let search = sample();
        let session = assert_ok!(search.open());
        let summary = assert_ok!(session.command(OFS_OWNER, &1000u32.to_ne_bytes()));
        assert_eq!(summary.records, 1);
        let records = assert_ok!(session.read(10));
        assert_eq!(records[0].name_lossy(), "/home/user/notes.txt");
        assert_eq!(records[0].pid, 43);
    }

    #[test]
    fn extra_argument_bytes_are_ignored() {
        let search = sample();
        let session = assert_ok!(search.open());
        let mut arg = 42u32.to_ne_bytes().to_vec();
        arg.extend_from_slice(&[0xff; 4]);
        assert_eq!(assert_ok!(session.command(OFS_PID, &arg)).records, 2);
    }

    #[test]
    fn name_argument_without_nul() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_ok!(session.command(OFS_NAME, b"/a"));
        assert_eq!(assert_ok!(session.read(10)).len(), 1);
    }

    #[test]
    fn long_name_argument_is_truncated() {
        let prefix = format!("/{}", "p".repeat(MAX_PATH_BYTES - 1));
        assert_eq!(prefix.len(), MAX_PATH_BYTES);

        let search = OpenFileSearch::new(
            MockProcessDirectory::builder()
                .process(1, 0)
                .file(&prefix, 0)
                .build(),
        );
        let session = assert_ok!(search.open());

        let mut argument = prefix.clone().into_bytes();
        argument.resize(100, b'q');
        let summary = assert_ok!(session.command(OFS_NAME, &argument));

        assert_eq!(summary.records, 1);
        let records = assert_ok!(session.read(1));
        assert_eq!(records[0].name_bytes(), prefix.as_bytes());
    }

    #[test]
    fn empty_name_argument_is_invalid() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_err!(session.command(OFS_NAME, b"\0/a"), Error::InvalidArgument(_));
    }

    #[test]
    fn pid_outside_range_is_invalid() {
        let search = sample();
        let session = assert_ok!(search.open());
        let arg = (i32::MAX as u32 + 1).to_ne_bytes();
        assert_err!(session.command(OFS_PID, &arg), Error::InvalidArgument(_));
    }
}

// ============================================================================
// Encoded reads
// ============================================================================

mod encoded_reads {
    use super::*;

    #[test]
    fn read_into_fills_whole_records() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_ok!(session.command(OFS_PID, &42u32.to_ne_bytes()));

        let mut out = vec![0u8; 4 * RECORD_SIZE];
        let written = assert_ok!(session.read_into(&mut out));
        assert_eq!(written, 2);

        let decoded: Vec<ResultRecord> = out
            .chunks_exact(RECORD_SIZE)
            .take(written)
            .filter_map(ResultRecord::from_bytes)
            .collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name_lossy(), "/a");
        assert_eq!(decoded[1].name_lossy(), "/b");
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn read_into_small_buffer_reads_nothing() {
        let search = sample();
        let session = assert_ok!(search.open());
        assert_ok!(session.command(OFS_PID, &42u32.to_ne_bytes()));

        let mut out = vec![0u8; RECORD_SIZE - 1];
        assert_eq!(assert_ok!(session.read_into(&mut out)), 0);
        assert_eq!(session.remaining(), 2);
    }
}
