//! Well-known per-user destination paths.
//!
//! All output lives under `~/.clam-prov/`: `audit.log` for file mode and
//! `audit.pipe` for pipe mode. The home directory comes from the password
//! database entry of the real user id, not from `$HOME`, so a program run
//! with a scrubbed environment still logs to the right place.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use nix::unistd::{getuid, User};
use tracing::debug;

use crate::error::{ProvError, ProvResult};

/// Name of the per-user directory holding all output.
pub const DIR_NAME: &str = ".clam-prov";
/// File name of the append-only log in file mode.
pub const LOG_FILE_NAME: &str = "audit.log";
/// File name of the FIFO in pipe mode.
pub const PIPE_FILE_NAME: &str = "audit.pipe";

/// Resolved paths must stay strictly below this many bytes.
pub const PATH_MAX_LEN: usize = 4096;

/// Permission bits of a newly created `.clam-prov` directory.
pub const DIR_MODE: u32 = 0o700;
/// Permission bits of a newly created log file or FIFO.
pub const OUTPUT_MODE_BITS: u32 = 0o660;

/// Resolves `<home>/.clam-prov/<name>` for a fixed home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    home: PathBuf,
}

impl PathResolver {
    /// Uses the home directory of the invoking user (`getpwuid(getuid())`).
    pub fn for_current_user() -> ProvResult<Self> {
        match User::from_uid(getuid()) {
            Ok(Some(user)) if !user.dir.as_os_str().is_empty() => Ok(Self { home: user.dir }),
            _ => Err(ProvError::HomeDirUnavailable),
        }
    }

    /// Uses `home` in place of the user's home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The `.clam-prov` directory under the home directory.
    pub fn dir(&self) -> PathBuf {
        self.home.join(DIR_NAME)
    }

    /// Resolves `<home>/.clam-prov/<name>`.
    ///
    /// With `create` set, a missing `.clam-prov` directory is created with
    /// mode `0700`. Calling this repeatedly is harmless: an existing
    /// directory is accepted as is. Nothing else on disk is touched.
    pub fn resolve(&self, name: &str, create: bool) -> ProvResult<PathBuf> {
        let dir = self.dir();
        let path = dir.join(name);
        // Reject before anything is created on disk.
        check_len(&path)?;
        ensure_dir(&dir, create)?;
        Ok(path)
    }

    /// `~/.clam-prov/audit.log`
    pub fn audit_log_path(&self, create: bool) -> ProvResult<PathBuf> {
        self.resolve(LOG_FILE_NAME, create)
    }

    /// `~/.clam-prov/audit.pipe`
    pub fn audit_pipe_path(&self, create: bool) -> ProvResult<PathBuf> {
        self.resolve(PIPE_FILE_NAME, create)
    }
}

fn check_len(path: &Path) -> ProvResult<()> {
    let len = path.as_os_str().len();
    if len >= PATH_MAX_LEN {
        return Err(ProvError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: PATH_MAX_LEN,
        });
    }
    Ok(())
}

fn ensure_dir(dir: &Path, create: bool) -> ProvResult<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ProvError::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !create {
                return Err(ProvError::DirectoryMissing(dir.to_path_buf()));
            }
            match DirBuilder::new().mode(DIR_MODE).create(dir) {
                Ok(()) => {
                    debug!(dir = %dir.display(), "created output directory");
                    Ok(())
                }
                // Lost a race with another process creating it.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => ensure_dir(dir, false),
                Err(source) => Err(ProvError::Directory {
                    path: dir.to_path_buf(),
                    source,
                }),
            }
        }
        Err(source) => Err(ProvError::Directory {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
