//! Reader for the binary record stream.
//!
//! This module decodes what the logger writes: fixed 284-byte records,
//! back to back, with no header. It works on anything implementing `Read`,
//! including the read end of the logger's named pipe.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::ReadError;
use crate::record::{Record, RECORD_SIZE};

/// Sequential decoder for a record stream.
///
/// Records are read one at a time. Hitting end-of-stream exactly on a record
/// boundary ends the stream; hitting it part way through a record is
/// reported as [`ReadError::Truncated`] and also ends the stream.
///
/// Short reads are retried until a full record or end-of-stream, so a
/// record split across pipe writes is still decoded whole.
///
/// # Examples
///
/// ```no_run
/// # use clam_prov::RecordReader;
/// # fn example() -> Result<(), clam_prov::ReadError> {
/// let mut reader = RecordReader::open("/home/me/.clam-prov/audit.log")?;
/// while let Some(record) = reader.read_record()? {
///     println!("{}", record);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RecordReader<R> {
    inner: R,
    records_read: u64,
    finished: bool,
}

impl RecordReader<File> {
    /// Opens a log file or FIFO for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        File::open(path).map(Self::new)
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            records_read: 0,
            finished: false,
        }
    }

    /// Number of complete records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The next record
    /// * `Ok(None)` - End of stream
    /// * `Err(ReadError::Truncated)` - The stream ended inside a record
    pub fn read_record(&mut self) -> Result<Option<Record>, ReadError> {
        if self.finished {
            return Ok(None);
        }

        let mut bytes = [0u8; RECORD_SIZE];
        let filled = match self.fill(&mut bytes) {
            Ok(n) => n,
            Err(e) => {
                self.finished = true;
                return Err(e.into());
            }
        };

        match filled {
            0 => {
                self.finished = true;
                Ok(None)
            }
            RECORD_SIZE => {
                self.records_read += 1;
                Ok(Some(Record::from_bytes(&bytes)))
            }
            residual => {
                self.finished = true;
                Err(ReadError::Truncated {
                    residual,
                    record_size: RECORD_SIZE,
                })
            }
        }
    }

    /// Reads until `buf` is full or the stream ends; returns the bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
