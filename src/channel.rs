use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{debug, warn};

use crate::error::{ProvError, ProvResult};
use crate::paths::{PathResolver, OUTPUT_MODE_BITS};

/// Which kind of destination the logger writes to.
///
/// The integer codes are part of the instrumentation ABI: `0` selects the
/// append-only file, `1` the named pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OutputMode {
    File = 0,
    Pipe = 1,
}

impl TryFrom<i32> for OutputMode {
    type Error = ProvError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OutputMode::File),
            1 => Ok(OutputMode::Pipe),
            other => Err(ProvError::InvalidOutputMode(other)),
        }
    }
}

impl FromStr for OutputMode {
    type Err = ProvError;

    /// Accepts the ABI codes as well as `file` / `pipe`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "file" => Ok(OutputMode::File),
            "1" | "pipe" => Ok(OutputMode::Pipe),
            _ => Err(ProvError::InvalidOutputMode(s.trim().parse().unwrap_or(-1))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::File => f.write_str("file"),
            OutputMode::Pipe => f.write_str("pipe"),
        }
    }
}

/// Destination for serialized records.
///
/// A sink receives the contiguous bytes of one flush at a time. It must issue
/// a single write attempt and report how many bytes went out: the logger
/// treats anything short of the full length as lost data and never retries.
///
/// [`OutputChannel`] is the production sink. Custom sinks can be installed
/// with [`ProvLogger::init_with_sink`](crate::ProvLogger::init_with_sink).
///
/// # Usage
///
/// ```
/// # use clam_prov::RecordSink;
/// # use std::io;
/// // Keeps every flushed byte in memory
/// struct MemorySink(Vec<u8>);
///
/// impl RecordSink for MemorySink {
///     fn write_records(&mut self, bytes: &[u8]) -> io::Result<usize> {
///         self.0.extend_from_slice(bytes);
///         Ok(bytes.len())
///     }
/// }
/// ```
pub trait RecordSink: Send {
    /// Writes one flush worth of serialized records.
    ///
    /// # Returns
    ///
    /// The number of bytes accepted by the single write attempt.
    fn write_records(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Releases the destination. Called once at shutdown; must tolerate
    /// repeated calls and must not fail.
    fn close(&mut self) {}
}

/// The open destination of one `Ready` interval: an append-only log file or
/// the write end of a named pipe.
#[derive(Debug)]
pub struct OutputChannel {
    mode: OutputMode,
    path: PathBuf,
    file: Option<File>,
}

impl OutputChannel {
    /// Opens the destination for `mode` under the resolver's home directory,
    /// creating `.clam-prov` when needed.
    ///
    /// # Blocking
    ///
    /// In pipe mode the open does not return until a reader opens the other
    /// end of the FIFO. There is no timeout.
    pub fn open(mode: OutputMode, resolver: &PathResolver) -> ProvResult<Self> {
        let path = match mode {
            OutputMode::File => resolver.audit_log_path(true)?,
            OutputMode::Pipe => resolver.audit_pipe_path(true)?,
        };
        let file = match mode {
            OutputMode::File => open_append_file(&path),
            OutputMode::Pipe => open_pipe_writer(&path),
        }
        .map_err(|source| ProvError::ChannelOpen {
            mode,
            path: path.clone(),
            source,
        })?;

        debug!(%mode, path = %path.display(), "output channel opened");
        Ok(Self {
            mode,
            path,
            file: Some(file),
        })
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

impl RecordSink for OutputChannel {
    /// Takes an advisory exclusive lock, issues exactly one `write`, syncs
    /// if every byte went out, then unlocks.
    fn write_records(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "output channel is closed"))?;

        let _lock = match AdvisoryLock::exclusive(file) {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "advisory lock unavailable, writing unlocked");
                None
            }
        };

        let mut writer: &File = file;
        let written = writer.write(bytes)?;
        if written == bytes.len() {
            // FIFOs reject fsync with EINVAL; there is nothing to sync there.
            if let Err(e) = file.sync_all() {
                debug!(error = %e, mode = %self.mode, "fsync skipped");
            }
        }
        Ok(written)
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(mode = %self.mode, path = %self.path.display(), "output channel closed");
        }
    }
}

impl Drop for OutputChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_append_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .mode(OUTPUT_MODE_BITS)
        .open(path)
}

fn open_pipe_writer(path: &Path) -> io::Result<File> {
    match mkfifo(path, Mode::from_bits_truncate(OUTPUT_MODE_BITS as _)) {
        Ok(()) | Err(Errno::EEXIST) => {}
        Err(errno) => return Err(io::Error::from(errno)),
    }
    // Blocks until a reader attaches.
    OpenOptions::new().write(true).open(path)
}

/// `flock(LOCK_EX)` held for the guard's lifetime.
///
/// Serializes writers from different processes sharing one destination.
/// Threads of this process are already serialized by the logger mutex.
struct AdvisoryLock<'a> {
    fd: RawFd,
    _file: &'a File,
}

impl<'a> AdvisoryLock<'a> {
    fn exclusive(file: &'a File) -> io::Result<Self> {
        let fd = file.as_raw_fd();
        loop {
            // SAFETY: fd is a valid descriptor owned by `file`, which outlives
            // the guard.
            let rc = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if rc == 0 {
                return Ok(Self { fd, _file: file });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl Drop for AdvisoryLock<'_> {
    fn drop(&mut self) {
        // SAFETY: same descriptor as in `exclusive`, still open.
        unsafe {
            libc::flock(self.fd, libc::LOCK_UN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_codes() {
        assert_eq!(OutputMode::try_from(0).unwrap(), OutputMode::File);
        assert_eq!(OutputMode::try_from(1).unwrap(), OutputMode::Pipe);
        assert!(matches!(
            OutputMode::try_from(2),
            Err(ProvError::InvalidOutputMode(2))
        ));
        assert!(OutputMode::try_from(-1).is_err());
    }

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("file".parse::<OutputMode>().unwrap(), OutputMode::File);
        assert_eq!(" PIPE ".parse::<OutputMode>().unwrap(), OutputMode::Pipe);
        assert_eq!("1".parse::<OutputMode>().unwrap(), OutputMode::Pipe);
        assert!(matches!(
            "7".parse::<OutputMode>(),
            Err(ProvError::InvalidOutputMode(7))
        ));
        assert!("socket".parse::<OutputMode>().is_err());
    }
}
