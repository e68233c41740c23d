//! Diagnostic logging for the logger itself.
//!
//! The crate reports lifecycle transitions, flushes and failures through
//! `tracing`. Inside an instrumented C program nobody installs a subscriber,
//! so [`init_from_env`] can install one on request. It never writes to
//! stdout, which belongs to the host program.

use std::env;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `debug` or `clam_prov=trace`.
pub const ENV_LOG: &str = "CLAM_PROV_LOG";
/// Directory receiving `clam-prov.diag.log`; stderr when unset.
pub const ENV_LOG_DIR: &str = "CLAM_PROV_LOG_DIR";
pub const DIAG_FILE_NAME: &str = "clam-prov.diag.log";

/// Installs a subscriber if `CLAM_PROV_LOG` is set.
///
/// Does nothing when the variable is unset or when a global subscriber is
/// already installed, so it is safe to call from every `init`.
pub fn init_from_env() {
    let Ok(directives) = env::var(ENV_LOG) else {
        return;
    };
    let log_dir = env::var_os(ENV_LOG_DIR);
    let _ = try_init(&directives, log_dir.as_deref().map(Path::new));
}

/// Installs a subscriber filtering with `directives` and writing to
/// `<log_dir>/clam-prov.diag.log`, or to stderr without a directory.
///
/// Invalid directives fall back to `warn`. Returns `false` if a global
/// subscriber was already set or the diagnostics file cannot be opened.
pub fn try_init(directives: &str, log_dir: Option<&Path>) -> bool {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = match RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(DIAG_FILE_NAME)
                .build(dir)
            {
                Ok(appender) => appender,
                Err(_) => return false,
            };
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(appender).with_ansi(false))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .is_ok(),
    }
}
