//! clam-prov-reader - print the records of a clam-prov audit log or pipe.

use std::path::PathBuf;
use std::process::ExitCode;

use clam_prov::{diagnostics, PathResolver, ReadError, RecordReader, RECORD_SIZE};
use clap::Parser;
use tracing::{debug, error};

/// Decode and print clam-prov call-site records
#[derive(Parser, Debug)]
#[command(name = "clam-prov-reader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Log file or FIFO to read; defaults to ~/.clam-prov/audit.log
    path: Option<PathBuf>,

    /// Stop after this many records
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Log level for diagnostics on stderr (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    diagnostics::try_init(&args.log_level, None);

    let path = match args.path {
        Some(path) => path,
        None => match PathResolver::for_current_user().and_then(|r| r.audit_log_path(false)) {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "no log path given and the default cannot be resolved");
                return ExitCode::FAILURE;
            }
        },
    };

    let reader = match RecordReader::open(&path) {
        Ok(reader) => reader,
        Err(e) => {
            error!(error = %e, path = %path.display(), "log file open failed");
            return ExitCode::FAILURE;
        }
    };

    // Never read past the limit: on a FIFO an extra read consumes a record
    // or blocks until the writer sends one.
    let limit = args.count.unwrap_or(u64::MAX);
    let mut printed = 0u64;
    for item in reader.take(usize::try_from(limit).unwrap_or(usize::MAX)) {
        match item {
            Ok(record) => {
                println!("{}", record);
                printed += 1;
            }
            Err(ReadError::Truncated { residual, .. }) => {
                println!(
                    "Invalid number of bytes in log file. Must be a multiple of {} ({} trailing bytes)",
                    RECORD_SIZE, residual
                );
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!(error = %e, "failed to read log file");
                return ExitCode::FAILURE;
            }
        }
    }

    debug!(records = printed, "done");
    ExitCode::SUCCESS
}
