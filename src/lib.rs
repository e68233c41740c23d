//! # clam-prov runtime logger
//!
//! The runtime half of clam-prov: instrumented programs call into this crate
//! at every source and sink call site, and it durably records which call
//! sites ran, on which thread, when, and with what result.
//!
//! * **Fixed wire format**: every observation is one 284-byte [`Record`]
//! * **Bounded memory**: records are staged in a buffer sized once at init
//! * **Backpressure**: a full buffer is flushed synchronously by the thread
//!   that filled it
//! * **Two destinations**: append-only `~/.clam-prov/audit.log` or the named
//!   pipe `~/.clam-prov/audit.pipe`
//!
//! ## Main Components
//!
//! * [`ProvLogger`]: lifecycle state machine, buffer and output behind one mutex
//! * [`global`]: the process-wide logger with boolean entry points
//! * [`ffi`]: the C symbols the instrumentation links against
//! * [`RecordReader`]: offline decoder for the record stream
//!
//! ## Quick Start
//!
//! ```
//! use clam_prov::{ProvLogger, RecordReader, RecordSink};
//! use std::io;
//! use std::sync::{Arc, Mutex};
//!
//! // Collect flushed bytes in memory instead of ~/.clam-prov
//! #[derive(Clone, Default)]
//! struct Shared(Arc<Mutex<Vec<u8>>>);
//! impl RecordSink for Shared {
//!     fn write_records(&mut self, bytes: &[u8]) -> io::Result<usize> {
//!         self.0.lock().unwrap().extend_from_slice(bytes);
//!         Ok(bytes.len())
//!     }
//! }
//!
//! let sink = Shared::default();
//! let logger = ProvLogger::new();
//! logger.init_with_sink(2, sink.clone()).unwrap();
//!
//! logger.buffer(1, 128, "read").unwrap();
//! logger.buffer(2, 128, "write").unwrap(); // buffer full: flushed here
//! logger.shutdown().unwrap();
//!
//! let data = sink.0.lock().unwrap();
//! let names: Vec<String> = RecordReader::new(&data[..])
//!     .map(|r| r.unwrap().function_name().into_owned())
//!     .collect();
//! assert_eq!(names, ["read", "write"]);
//! ```

#[cfg(not(unix))]
compile_error!("clam_prov supports Unix targets only");

pub mod buffer;
pub mod channel;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ffi;
pub mod global;
pub mod logger;
pub mod paths;
pub mod reader;
pub mod record;

pub use buffer::{FlushStats, RecordBuffer};
pub use channel::{OutputChannel, OutputMode, RecordSink};
pub use config::LoggerConfig;
pub use error::{ProvError, ProvResult, ReadError};
pub use logger::{LifecycleState, ProvLogger};
pub use paths::PathResolver;
pub use reader::RecordReader;
pub use record::{Record, FUNCTION_NAME_LEN, RECORD_SIZE};
