use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::channel::OutputMode;

/// Environment variable overriding [`LoggerConfig::max_records`].
pub const ENV_MAX_RECORDS: &str = "CLAM_PROV_MAX_RECORDS";
/// Environment variable overriding [`LoggerConfig::output_mode`]
/// (`0`/`file` or `1`/`pipe`).
pub const ENV_OUTPUT_MODE: &str = "CLAM_PROV_OUTPUT_MODE";

pub const DEFAULT_MAX_RECORDS: i64 = 1024;

/// Parameters of one `init` call.
///
/// `max_records` is signed because it arrives from instrumented code as a C
/// `int`; values below 1 are rejected by `init`, not here.
///
/// # Examples
///
/// ```
/// # use clam_prov::{LoggerConfig, OutputMode};
/// let config = LoggerConfig::new(4096, OutputMode::Pipe).with_home_dir("/tmp/prov-home");
/// assert_eq!(config.max_records, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Capacity of the record buffer; a full buffer triggers a flush.
    pub max_records: i64,
    pub output_mode: OutputMode,
    /// Directory standing in for the user's home. `None` looks the home
    /// directory up in the password database.
    pub home_dir: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            output_mode: OutputMode::File,
            home_dir: None,
        }
    }
}

impl LoggerConfig {
    pub fn new(max_records: i64, output_mode: OutputMode) -> Self {
        Self {
            max_records,
            output_mode,
            home_dir: None,
        }
    }

    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Defaults overlaid with `CLAM_PROV_MAX_RECORDS` and
    /// `CLAM_PROV_OUTPUT_MODE`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(ENV_MAX_RECORDS) {
            match raw.trim().parse::<i64>() {
                Ok(n) => config.max_records = n,
                Err(_) => warn!(var = ENV_MAX_RECORDS, value = %raw, "ignoring unparseable value"),
            }
        }
        if let Ok(raw) = env::var(ENV_OUTPUT_MODE) {
            match raw.parse::<OutputMode>() {
                Ok(mode) => config.output_mode = mode,
                Err(_) => warn!(var = ENV_OUTPUT_MODE, value = %raw, "ignoring unparseable value"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.max_records, DEFAULT_MAX_RECORDS);
        assert_eq!(config.output_mode, OutputMode::File);
        assert!(config.home_dir.is_none());
    }

    #[test]
    fn test_builder() {
        let config = LoggerConfig::new(8, OutputMode::Pipe).with_home_dir("/var/empty");
        assert_eq!(config.max_records, 8);
        assert_eq!(config.output_mode, OutputMode::Pipe);
        assert_eq!(config.home_dir, Some(PathBuf::from("/var/empty")));
    }
}
