//! Open File Search Core Library
//!
//! Answers "which files are open, by whom" queries over a process directory:
//! - Process directory adapter (`/proc` on Linux)
//! - Query engine with a fixed-capacity result buffer
//! - Single-session control channel with raw command decoding
//! - Configuration, logging and exit codes for the `ofs` CLI
//!
//! The binary entry point is in `main.rs`.

pub mod adapter;
pub mod buffer;
pub mod config;
pub mod control;
pub mod engine;
pub mod exit_codes;
pub mod filter;
pub mod logging;
pub mod session;

pub use adapter::{DirectoryError, FileHandle, FileMetadata, ProcessDirectory, ProcessHandle};
#[cfg(target_os = "linux")]
pub use adapter::ProcFs;
pub use buffer::{ResultBuffer, DEFAULT_CAPACITY};
pub use control::{OpenFileSearch, Session};
pub use engine::{QueryEngine, QuerySummary};

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_process;
#[cfg(all(unix, any(test, feature = "test-utils")))]
pub mod test_utils;
