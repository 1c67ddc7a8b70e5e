//! Open file search common types.
//!
//! Shared between the engine and its clients:
//! - Result records and their stable byte layout
//! - Queries and the raw command encoding
//! - The unified error type
//! - Output format specifications

pub mod error;
pub mod output;
pub mod query;
pub mod record;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use output::OutputFormat;
pub use query::{CommandKind, Query, OFS_NAME, OFS_OWNER, OFS_PID, OFS_UID};
pub use record::{ResultRecord, MAX_PATH_BYTES, NAME_LEN, RECORD_SIZE};
