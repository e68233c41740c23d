use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::channel::OutputMode;

/// Errors reported by the provenance logger.
///
/// Every entry point of [`ProvLogger`](crate::ProvLogger) returns one of these
/// instead of panicking. The process-wide facade in [`crate::global`] folds
/// them into booleans so a broken logger never takes the host program down.
#[derive(Debug, Error)]
pub enum ProvError {
    /// The invoking user has no entry (or no home) in the password database.
    #[error("could not resolve the home directory of the current user")]
    HomeDirUnavailable,

    /// The composed destination path does not fit in the fixed path budget.
    #[error("path {path:?} is {len} bytes, limit is {max}")]
    PathTooLong { path: PathBuf, len: usize, max: usize },

    /// The `.clam-prov` directory does not exist and creation was not requested.
    #[error("directory {0:?} does not exist")]
    DirectoryMissing(PathBuf),

    /// Something other than a directory sits where `.clam-prov` should be.
    #[error("{0:?} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// The `.clam-prov` directory could not be inspected or created.
    #[error("cannot access or create directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Opening the file or creating/opening the FIFO failed.
    #[error("failed to open {mode} output at {path:?}: {source}")]
    ChannelOpen {
        mode: OutputMode,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown output mode {0}, expected 0 (file) or 1 (pipe)")]
    InvalidOutputMode(i32),

    #[error("max_records must be at least 1, got {0}")]
    InvalidMaxRecords(i64),

    /// The record buffer (or its serialization scratch) could not be reserved.
    #[error("failed to allocate a buffer for {records} records")]
    Allocation { records: usize },

    /// An insert found no free slot. The logger flushes before this can
    /// happen, so seeing it means the flush invariant was broken.
    #[error("record buffer is full ({capacity} records)")]
    BufferFull { capacity: usize },

    /// The callee name could not be copied into the record.
    #[error("function name rejected: {0}")]
    NameRejected(&'static str),

    /// The flush wrote fewer bytes than it serialized. The unwritten records
    /// are gone: the buffer is cleared regardless.
    #[error("partial write: {written} of {expected} bytes written")]
    PartialWrite { expected: usize, written: usize },

    /// The flush write failed outright. The buffered records are gone.
    #[error("write to output channel failed: {0}")]
    Write(#[source] io::Error),

    #[error("logger is already initialized")]
    AlreadyInitialized,

    #[error("logger is not initialized")]
    NotInitialized,
}

pub type ProvResult<T> = Result<T, ProvError>;

/// Errors produced while decoding a record stream.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read record stream: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a record.
    #[error("stream ended {residual} bytes into a {record_size}-byte record")]
    Truncated { residual: usize, record_size: usize },
}
