use tracing::{trace, warn};

use crate::channel::RecordSink;
use crate::error::{ProvError, ProvResult};
use crate::record::{Record, RECORD_SIZE};

/// Decides whether a flush writes anything.
///
/// True when forced or when `count` has reached `capacity`. `>=` rather than
/// `==` so a cursor that somehow moved past capacity still drains.
#[inline]
pub fn should_flush(count: usize, capacity: usize, force: bool) -> bool {
    force || count >= capacity
}

/// Counters for one `Ready` interval of the logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Flushes that issued a write, successful or not.
    pub flushes: u64,
    /// Flushes whose write failed or came up short.
    pub failed_flushes: u64,
    pub bytes_written: u64,
    /// Records that reached the sink in full.
    pub records_written: u64,
    /// Records discarded because their bytes never reached the sink.
    pub records_dropped: u64,
}

/// Fixed-capacity staging area for records between flushes.
///
/// Both the record slots and the contiguous serialization area are reserved
/// up front, so inserting and flushing never allocate. The buffer is never
/// resized; it lives for exactly one `Ready` interval of the logger.
///
/// # Flushing
///
/// A flush serializes all buffered records in insertion order into one byte
/// run and hands it to the sink in a single write. Afterwards the buffer is
/// empty whether or not the write succeeded: a failed or short write loses
/// the records it did not cover. Memory stays bounded under a persistently
/// failing destination, at the cost of delivery.
pub struct RecordBuffer {
    records: Vec<Record>,
    capacity: usize,
    scratch: Vec<u8>,
    stats: FlushStats,
}

impl RecordBuffer {
    /// Reserves room for `capacity` records and their serialized bytes.
    ///
    /// Fails with [`ProvError::InvalidMaxRecords`] for a zero capacity and
    /// with [`ProvError::Allocation`] when the memory cannot be reserved.
    pub fn with_capacity(capacity: usize) -> ProvResult<Self> {
        if capacity == 0 {
            return Err(ProvError::InvalidMaxRecords(0));
        }
        let alloc_err = || ProvError::Allocation { records: capacity };

        let mut records = Vec::new();
        records.try_reserve_exact(capacity).map_err(|_| alloc_err())?;

        let scratch_len = capacity.checked_mul(RECORD_SIZE).ok_or_else(alloc_err)?;
        let mut scratch = Vec::new();
        scratch.try_reserve_exact(scratch_len).map_err(|_| alloc_err())?;

        Ok(Self {
            records,
            capacity,
            scratch,
            stats: FlushStats::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered records (the write cursor).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// Stores `record` in the next free slot.
    pub fn insert(&mut self, record: Record) -> ProvResult<()> {
        if self.is_full() {
            return Err(ProvError::BufferFull {
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Writes the buffered records to `sink` if `force` is set or the buffer
    /// is full.
    ///
    /// # Returns
    ///
    /// The number of records handed to the sink; `0` when there was nothing
    /// to do. A short write yields [`ProvError::PartialWrite`] and a failed
    /// one [`ProvError::Write`]. In both cases the buffer has been cleared.
    pub fn flush(&mut self, sink: &mut dyn RecordSink, force: bool) -> ProvResult<usize> {
        let count = self.records.len();
        if count == 0 || !should_flush(count, self.capacity, force) {
            return Ok(0);
        }

        self.scratch.clear();
        for record in &self.records {
            record.encode_into(&mut self.scratch);
        }
        let expected = self.scratch.len();
        debug_assert_eq!(expected, count * RECORD_SIZE);

        let result = sink.write_records(&self.scratch);
        // Unconditional: whatever the write did not cover is dropped.
        self.records.clear();
        self.stats.flushes += 1;

        match result {
            Ok(written) if written == expected => {
                self.stats.bytes_written += written as u64;
                self.stats.records_written += count as u64;
                trace!(records = count, bytes = written, "flushed");
                Ok(count)
            }
            Ok(written) => {
                let complete = written / RECORD_SIZE;
                self.stats.failed_flushes += 1;
                self.stats.bytes_written += written as u64;
                self.stats.records_written += complete as u64;
                self.stats.records_dropped += (count - complete) as u64;
                warn!(
                    expected,
                    written,
                    dropped = count - complete,
                    "partial write, unwritten records dropped"
                );
                Err(ProvError::PartialWrite { expected, written })
            }
            Err(e) => {
                self.stats.failed_flushes += 1;
                self.stats.records_dropped += count as u64;
                warn!(error = %e, dropped = count, "write failed, buffered records dropped");
                Err(ProvError::Write(e))
            }
        }
    }
}
