//! Process-wide entry points for instrumented programs.
//!
//! Instrumented code has no place to keep a logger handle, so this module
//! owns one [`ProvLogger`] for the whole process and exposes the four
//! lifecycle calls as plain functions returning `bool`. A `false` means the
//! call had no effect on the output; the host program is expected to carry
//! on regardless.
//!
//! The singleton is constructed lazily and starts `Uninitialized`; `init`
//! is still the only way to make it `Ready`.

use lazy_static::lazy_static;
use tracing::{debug, warn};

use crate::buffer::FlushStats;
use crate::channel::OutputMode;
use crate::config::LoggerConfig;
use crate::error::{ProvError, ProvResult};
use crate::logger::{LifecycleState, ProvLogger};

lazy_static! {
    /// The logger shared by every thread of the process.
    static ref PROCESS_LOGGER: ProvLogger = ProvLogger::new();
}

/// The process-wide logger, for callers that want `Result`s instead of
/// booleans.
pub fn logger() -> &'static ProvLogger {
    &PROCESS_LOGGER
}

/// Initializes the process-wide logger.
///
/// # Arguments
///
/// * `max_records` - Buffer capacity in records; must be at least 1
/// * `output_mode` - `0` for `~/.clam-prov/audit.log`, `1` for
///   `~/.clam-prov/audit.pipe` (blocks until a reader attaches)
pub fn init(max_records: i32, output_mode: i32) -> bool {
    let config = OutputMode::try_from(output_mode)
        .map(|mode| LoggerConfig::new(i64::from(max_records), mode));
    match config {
        Ok(config) => init_with_config(&config),
        Err(e) => report("init", Err::<(), _>(e)),
    }
}

/// Initializes the process-wide logger from a full configuration.
pub fn init_with_config(config: &LoggerConfig) -> bool {
    report("init", PROCESS_LOGGER.init(config))
}

/// Initializes the process-wide logger from `CLAM_PROV_MAX_RECORDS` and
/// `CLAM_PROV_OUTPUT_MODE`, falling back to the defaults.
pub fn init_from_env() -> bool {
    init_with_config(&LoggerConfig::from_env())
}

/// Buffers one call-site observation, flushing if the buffer fills up.
pub fn buffer(call_site_id: i64, exit_value: i64, function_name: impl AsRef<[u8]>) -> bool {
    report(
        "buffer",
        PROCESS_LOGGER.buffer(call_site_id, exit_value, function_name),
    )
}

/// Flushes the buffer if it is full, or unconditionally with `force`.
pub fn check_and_flush(force: bool) -> bool {
    report("check_and_flush", PROCESS_LOGGER.check_and_flush(force))
}

/// Flushes what is left and releases the buffer and output channel.
pub fn shutdown() -> bool {
    report("shutdown", PROCESS_LOGGER.shutdown())
}

pub fn state() -> LifecycleState {
    PROCESS_LOGGER.state()
}

/// Counters of the current `Ready` interval, if any.
pub fn stats() -> Option<FlushStats> {
    PROCESS_LOGGER.stats().ok()
}

/// Folds a result into the boolean the entry points return.
///
/// Lifecycle misuse is routine for instrumented code (calls after a failed
/// init, calls racing shutdown) and only logged at debug level.
fn report<T>(op: &'static str, result: ProvResult<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e @ (ProvError::NotInitialized | ProvError::AlreadyInitialized)) => {
            debug!(op, error = %e, "provenance call rejected");
            false
        }
        Err(e) => {
            warn!(op, error = %e, "provenance call failed");
            false
        }
    }
}
