//! Control channel.
//!
//! [`OpenFileSearch`] owns one query engine, its result buffer, and the
//! session gate. Clients call [`OpenFileSearch::open`] to get a [`Session`],
//! the only handle that can issue commands and read results. Dropping or
//! closing the session releases the channel for the next client.
//!
//! ```ignore
//! let search = OpenFileSearch::new(ProcFs::default());
//! let session = search.open()?;
//! session.command(OFS_PID, &std::process::id().to_ne_bytes())?;
//! let records = session.read(256)?;
//! session.close();
//! ```

use crate::adapter::ProcessDirectory;
use crate::buffer::{ResultBuffer, DEFAULT_CAPACITY};
use crate::engine::{QueryEngine, QuerySummary};
use ofs_common::{CommandKind, Error, Query, Result, ResultRecord, RECORD_SIZE};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[cfg(target_os = "linux")]
use crate::adapter::ProcFs;
#[cfg(target_os = "linux")]
use crate::config::EngineConfig;

#[derive(Debug)]
struct Shared<D> {
    engine: QueryEngine<D>,
    buffer: Mutex<ResultBuffer>,
    gate: crate::session::SessionGate,
}

impl<D> Shared<D> {
    fn buffer(&self) -> MutexGuard<'_, ResultBuffer> {
        // The buffer stays consistent across a panicking holder
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One open-file search instance. Cloning shares the same channel.
#[derive(Debug)]
pub struct OpenFileSearch<D> {
    shared: Arc<Shared<D>>,
}

impl<D> Clone for OpenFileSearch<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: ProcessDirectory> OpenFileSearch<D> {
    /// Channel over `directory` with the default buffer capacity.
    pub fn new(directory: D) -> Self {
        Self::with_engine(QueryEngine::new(directory), DEFAULT_CAPACITY)
    }

    pub fn with_capacity(directory: D, capacity: usize) -> Self {
        Self::with_engine(QueryEngine::new(directory), capacity)
    }

    pub fn with_engine(engine: QueryEngine<D>, capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                buffer: Mutex::new(ResultBuffer::with_capacity(capacity)),
                gate: crate::session::SessionGate::new(),
            }),
        }
    }

    /// Open a session, or fail with [`Error::Busy`] if one is already open.
    pub fn open(&self) -> Result<Session<D>> {
        if !self.shared.gate.acquire() {
            debug!("open refused, session busy");
            return Err(Error::Busy);
        }
        debug!("session opened");
        Ok(Session {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn is_open(&self) -> bool {
        self.shared.gate.is_held()
    }

    pub fn capacity(&self) -> usize {
        self.shared.buffer().capacity()
    }

    pub fn directory(&self) -> &D {
        self.shared.engine.directory()
    }
}

#[cfg(target_os = "linux")]
impl OpenFileSearch<ProcFs> {
    /// Channel over the proc filesystem described by `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        let engine = QueryEngine::new(ProcFs::new(&config.proc_root))
            .with_scan_budget(config.scan_budget());
        Self::with_engine(engine, config.capacity)
    }
}

/// Exclusive handle on an [`OpenFileSearch`] channel.
#[derive(Debug)]
pub struct Session<D> {
    shared: Arc<Shared<D>>,
}

impl<D: ProcessDirectory> Session<D> {
    /// Run `query`, discarding any unread results of the previous one.
    pub fn submit(&self, query: &Query) -> Result<QuerySummary> {
        let mut buffer = self.shared.buffer();
        self.shared.engine.execute(query, &mut buffer)
    }

    /// Decode a raw command and its argument bytes, then run it.
    ///
    /// Integer commands read a native-endian `u32`; `OFS_NAME` reads a
    /// NUL-terminated path.
    pub fn command(&self, command: u32, argument: &[u8]) -> Result<QuerySummary> {
        let kind = CommandKind::from_raw(command)?;
        let query = kind.decode(argument)?;
        self.submit(&query)
    }

    /// Take up to `max` unread records.
    pub fn read(&self, max: usize) -> Result<Vec<ResultRecord>> {
        self.shared.buffer().drain(max)
    }

    /// Fill `out` with as many encoded records as fit, returning how many
    /// were written. Trailing bytes past the last whole record are untouched.
    pub fn read_into(&self, out: &mut [u8]) -> Result<usize> {
        let records = self.read(out.len() / RECORD_SIZE)?;
        for (slot, record) in out.chunks_exact_mut(RECORD_SIZE).zip(&records) {
            slot.copy_from_slice(&record.to_bytes());
        }
        Ok(records.len())
    }

    /// Records of the current query not yet read.
    pub fn remaining(&self) -> usize {
        self.shared.buffer().remaining()
    }

    /// Release the channel.
    pub fn close(self) {}
}

impl<D> Drop for Session<D> {
    fn drop(&mut self) {
        self.shared.gate.release();
        debug!("session closed");
    }
}
