//! Core of the runtime provenance logger.
//!
//! This module provides the ProvLogger struct, which buffers call-site
//! records from any number of threads and writes them to one output channel.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::{FlushStats, RecordBuffer};
use crate::channel::{OutputChannel, RecordSink};
use crate::clock::{current_millis, current_thread_id};
use crate::config::LoggerConfig;
use crate::error::{ProvError, ProvResult};
use crate::paths::PathResolver;
use crate::record::Record;

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;
const SHUTTING_DOWN: u8 = 3;

/// Observable lifecycle of a [`ProvLogger`].
///
/// An `init` or `shutdown` in progress is reported as `Uninitialized`: the
/// logger only counts as `Ready` once `init` has finished and until
/// `shutdown` begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
}

impl LifecycleState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            READY => LifecycleState::Ready,
            _ => LifecycleState::Uninitialized,
        }
    }
}

/// Resources owned for the length of one `Ready` interval.
struct Active {
    buffer: RecordBuffer,
    sink: Box<dyn RecordSink>,
}

/// A thread-safe provenance logger with an explicit init/shutdown lifecycle.
///
/// The logger writes fixed 284-byte [`Record`]s to an append-only file or a
/// named pipe:
///
/// 1. `init` reserves a buffer of `max_records` records and opens the output
/// 2. Every `buffer` call stores one record under the logger's mutex
/// 3. When the buffer fills up, the same call serializes and writes it while
///    still holding the mutex, so other producers wait (backpressure)
/// 4. `shutdown` writes whatever is left and releases buffer and output
///
/// # Thread Safety
///
/// All state sits behind one mutex. Records reach the output in the order
/// their `buffer` calls acquired it. The lifecycle flag is a separate atomic
/// so that exactly one of several racing `init` calls wins.
///
/// # Failure
///
/// No method panics. Every failure comes back as a [`ProvError`]; a failed
/// `init` leaves the logger `Uninitialized` with nothing held.
///
/// # Examples
///
/// ```no_run
/// # use clam_prov::{LoggerConfig, OutputMode, ProvLogger};
/// let logger = ProvLogger::new();
/// logger.init(&LoggerConfig::new(1024, OutputMode::File))?;
///
/// logger.buffer(17, 42, "read")?;
/// logger.buffer(18, 42, "write")?;
///
/// logger.shutdown()?;
/// # Ok::<(), clam_prov::ProvError>(())
/// ```
pub struct ProvLogger {
    state: AtomicU8,
    inner: Mutex<Option<Active>>,
}

impl Default for ProvLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvLogger {
    /// Creates an uninitialized logger. Nothing is allocated or opened until
    /// [`init`](Self::init).
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
            inner: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Reserves the record buffer and opens the output channel.
    ///
    /// Fails with [`ProvError::AlreadyInitialized`] unless the logger is
    /// `Uninitialized`, in which case nothing is reallocated or reopened.
    /// `max_records < 1`, an unresolvable home directory, allocation failure
    /// and open failure all leave the logger `Uninitialized`.
    ///
    /// In pipe mode this blocks until a reader opens the FIFO.
    pub fn init(&self, config: &LoggerConfig) -> ProvResult<()> {
        self.begin_init()?;
        let active = Self::capacity(config.max_records)
            .and_then(RecordBuffer::with_capacity)
            .and_then(|buffer| {
                let resolver = match &config.home_dir {
                    Some(home) => PathResolver::with_home(home),
                    None => PathResolver::for_current_user()?,
                };
                let channel = OutputChannel::open(config.output_mode, &resolver)?;
                Ok(Active {
                    buffer,
                    sink: Box::new(channel),
                })
            });
        self.finish_init(active)
    }

    /// Like [`init`](Self::init), but writes to `sink` instead of opening a
    /// file or pipe.
    pub fn init_with_sink(&self, max_records: i64, sink: impl RecordSink + 'static) -> ProvResult<()> {
        self.begin_init()?;
        let active = Self::capacity(max_records)
            .and_then(RecordBuffer::with_capacity)
            .map(|buffer| Active {
                buffer,
                sink: Box::new(sink),
            });
        self.finish_init(active)
    }

    fn capacity(max_records: i64) -> ProvResult<usize> {
        if max_records < 1 {
            return Err(ProvError::InvalidMaxRecords(max_records));
        }
        usize::try_from(max_records).map_err(|_| ProvError::Allocation {
            records: usize::MAX,
        })
    }

    fn begin_init(&self) -> ProvResult<()> {
        self.state
            .compare_exchange(UNINITIALIZED, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ProvError::AlreadyInitialized)
    }

    fn finish_init(&self, active: ProvResult<Active>) -> ProvResult<()> {
        match active {
            Ok(active) => {
                let capacity = active.buffer.capacity();
                *self.inner.lock() = Some(active);
                self.state.store(READY, Ordering::Release);
                debug!(capacity, "provenance logger ready");
                Ok(())
            }
            Err(e) => {
                // Whatever was acquired has already been dropped.
                self.state.store(UNINITIALIZED, Ordering::Release);
                debug!(error = %e, "provenance logger init failed");
                Err(e)
            }
        }
    }

    fn ensure_ready(&self) -> ProvResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ProvError::NotInitialized)
        }
    }

    /// Records one call-site observation.
    ///
    /// The record is stamped with the current time and the caller's thread
    /// id. If it fills the buffer, the buffer is flushed before returning.
    ///
    /// # Errors
    ///
    /// * [`ProvError::NotInitialized`] outside a `Ready` interval
    /// * [`ProvError::NameRejected`] for an empty name; nothing is buffered
    ///
    /// Once the record is accepted the call succeeds. A failure of the flush
    /// it triggers is logged and counted in [`FlushStats`], not returned.
    pub fn buffer(
        &self,
        call_site_id: i64,
        exit_value: i64,
        function_name: impl AsRef<[u8]>,
    ) -> ProvResult<()> {
        self.ensure_ready()?;
        let mut guard = self.inner.lock();
        let active = guard.as_mut().ok_or(ProvError::NotInitialized)?;

        let record = Record::new(
            current_millis(),
            current_thread_id(),
            call_site_id,
            exit_value,
            function_name.as_ref(),
        )?;
        active.buffer.insert(record)?;
        // Failures are already logged and counted by the buffer.
        let _ = active.buffer.flush(active.sink.as_mut(), false);
        Ok(())
    }

    /// Flushes if `force` is set or the buffer is full.
    ///
    /// # Returns
    ///
    /// The number of records written, `0` if nothing was due.
    pub fn check_and_flush(&self, force: bool) -> ProvResult<usize> {
        self.ensure_ready()?;
        let mut guard = self.inner.lock();
        let active = guard.as_mut().ok_or(ProvError::NotInitialized)?;
        active.buffer.flush(active.sink.as_mut(), force)
    }

    /// Number of records waiting in the buffer.
    pub fn buffered(&self) -> ProvResult<usize> {
        self.ensure_ready()?;
        let guard = self.inner.lock();
        guard
            .as_ref()
            .map(|active| active.buffer.len())
            .ok_or(ProvError::NotInitialized)
    }

    /// Counters of the current `Ready` interval.
    pub fn stats(&self) -> ProvResult<FlushStats> {
        self.ensure_ready()?;
        let guard = self.inner.lock();
        guard
            .as_ref()
            .map(|active| active.buffer.stats())
            .ok_or(ProvError::NotInitialized)
    }

    /// Writes out the remaining records, frees the buffer, closes the output
    /// and returns to `Uninitialized`.
    ///
    /// A failure of the final flush is logged and reflected in the returned
    /// counters, but does not fail the shutdown: the resources are released
    /// either way.
    ///
    /// # Returns
    ///
    /// The counters of the interval that just ended.
    pub fn shutdown(&self) -> ProvResult<FlushStats> {
        self.state
            .compare_exchange(READY, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProvError::NotInitialized)?;

        let mut guard = self.inner.lock();
        let stats = match guard.take() {
            Some(Active { mut buffer, mut sink }) => {
                // Failures are already logged by the buffer.
                let _ = buffer.flush(sink.as_mut(), true);
                let stats = buffer.stats();
                drop(buffer);
                sink.close();
                stats
            }
            None => FlushStats::default(),
        };
        drop(guard);

        self.state.store(UNINITIALIZED, Ordering::Release);
        debug!(?stats, "provenance logger shut down");
        Ok(stats)
    }
}

impl Drop for ProvLogger {
    fn drop(&mut self) {
        // Ensure the last records are written
        if self.is_ready() {
            let _ = self.shutdown();
        }
    }
}
