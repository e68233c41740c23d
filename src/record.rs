//! Wire layout of one call-site observation.
//!
//! Fields are concatenated in declaration order with no padding and no
//! header, in the producer's native byte order:
//!
//! `[time(8) | thread_id(4) | call_site_id(8) | exit_value(8) | function_name(256)]`
//!
//! The thread id occupies the slot existing readers label `pid`.

use std::borrow::Cow;
use std::fmt;

use crate::error::{ProvError, ProvResult};

/// Capacity of the NUL-padded function name field.
pub const FUNCTION_NAME_LEN: usize = 256;

const TIME_SIZE: usize = 8;
const THREAD_ID_SIZE: usize = 4;
const CALL_SITE_ID_SIZE: usize = 8;
const EXIT_VALUE_SIZE: usize = 8;

/// Size in bytes of one serialized record. Always 284.
pub const RECORD_SIZE: usize =
    TIME_SIZE + THREAD_ID_SIZE + CALL_SITE_ID_SIZE + EXIT_VALUE_SIZE + FUNCTION_NAME_LEN;

/// One observation of an instrumented call site.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Milliseconds since the Unix epoch when the record was buffered.
    pub time: u64,
    /// OS thread id of the thread that buffered the record.
    pub thread_id: i32,
    /// Build-time identifier of the call site. Opaque to the logger.
    pub call_site_id: i64,
    /// Return value observed at the call site.
    pub exit_value: i64,
    function_name: [u8; FUNCTION_NAME_LEN],
}

impl Record {
    /// Builds a record, copying `function_name` into the fixed name field.
    ///
    /// The name is read up to its first NUL byte, like a C string. Names of
    /// 256 bytes or more are truncated to 255 bytes so the field always keeps
    /// a terminating NUL. An empty name is rejected.
    pub fn new(
        time: u64,
        thread_id: i32,
        call_site_id: i64,
        exit_value: i64,
        function_name: &[u8],
    ) -> ProvResult<Self> {
        Ok(Self {
            time,
            thread_id,
            call_site_id,
            exit_value,
            function_name: copy_function_name(function_name)?,
        })
    }

    /// The raw, NUL-padded name field exactly as it appears on the wire.
    pub fn function_name_bytes(&self) -> &[u8; FUNCTION_NAME_LEN] {
        &self.function_name
    }

    /// The function name up to the first NUL, lossily decoded as UTF-8.
    pub fn function_name(&self) -> Cow<'_, str> {
        let end = self
            .function_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FUNCTION_NAME_LEN);
        String::from_utf8_lossy(&self.function_name[..end])
    }

    /// Appends the serialized record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.time.to_ne_bytes());
        out.extend_from_slice(&self.thread_id.to_ne_bytes());
        out.extend_from_slice(&self.call_site_id.to_ne_bytes());
        out.extend_from_slice(&self.exit_value.to_ne_bytes());
        out.extend_from_slice(&self.function_name);
    }

    /// Returns the 284-byte wire form of the record.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        let mut pos = 0;
        put(&mut bytes, &mut pos, &self.time.to_ne_bytes());
        put(&mut bytes, &mut pos, &self.thread_id.to_ne_bytes());
        put(&mut bytes, &mut pos, &self.call_site_id.to_ne_bytes());
        put(&mut bytes, &mut pos, &self.exit_value.to_ne_bytes());
        put(&mut bytes, &mut pos, &self.function_name);
        debug_assert_eq!(pos, RECORD_SIZE);
        bytes
    }

    /// Decodes one record. Any 284 bytes form a valid record; the name field
    /// is kept verbatim so re-encoding reproduces the input exactly.
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut pos = 0;
        let time = u64::from_ne_bytes(take(bytes, &mut pos));
        let thread_id = i32::from_ne_bytes(take(bytes, &mut pos));
        let call_site_id = i64::from_ne_bytes(take(bytes, &mut pos));
        let exit_value = i64::from_ne_bytes(take(bytes, &mut pos));
        let function_name = take(bytes, &mut pos);
        Self {
            time,
            thread_id,
            call_site_id,
            exit_value,
            function_name,
        }
    }
}

fn put(dst: &mut [u8; RECORD_SIZE], pos: &mut usize, src: &[u8]) {
    dst[*pos..*pos + src.len()].copy_from_slice(src);
    *pos += src.len();
}

fn take<const N: usize>(src: &[u8; RECORD_SIZE], pos: &mut usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[*pos..*pos + N]);
    *pos += N;
    out
}

/// Best-effort copy of a callee name into the fixed field.
fn copy_function_name(src: &[u8]) -> ProvResult<[u8; FUNCTION_NAME_LEN]> {
    let src = match src.iter().position(|&b| b == 0) {
        Some(nul) => &src[..nul],
        None => src,
    };
    if src.is_empty() {
        return Err(ProvError::NameRejected("empty function name"));
    }
    let len = src.len().min(FUNCTION_NAME_LEN - 1);
    let mut dst = [0u8; FUNCTION_NAME_LEN];
    dst[..len].copy_from_slice(&src[..len]);
    Ok(dst)
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("time", &self.time)
            .field("thread_id", &self.thread_id)
            .field("call_site_id", &self.call_site_id)
            .field("exit_value", &self.exit_value)
            .field("function_name", &self.function_name())
            .finish()
    }
}

/// One line per record, as printed by `clam-prov-reader`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record[time={}, pid={}, call_site_tag={}, exit={}, function_name={}]",
            self.time,
            self.thread_id,
            self.call_site_id,
            self.exit_value,
            self.function_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Record {
        Record::new(1_700_000_000_123, 4242, -7, 512, name.as_bytes()).unwrap()
    }

    #[test]
    fn test_record_size_is_fixed() {
        assert_eq!(RECORD_SIZE, 284);
        assert_eq!(sample("read").to_bytes().len(), RECORD_SIZE);
    }

    #[test]
    fn test_field_offsets() {
        let bytes = sample("write").to_bytes();
        assert_eq!(&bytes[0..8], &1_700_000_000_123u64.to_ne_bytes());
        assert_eq!(&bytes[8..12], &4242i32.to_ne_bytes());
        assert_eq!(&bytes[12..20], &(-7i64).to_ne_bytes());
        assert_eq!(&bytes[20..28], &512i64.to_ne_bytes());
        assert_eq!(&bytes[28..33], b"write");
        assert!(bytes[33..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_into_matches_to_bytes() {
        let record = sample("fread");
        let mut out = Vec::new();
        record.encode_into(&mut out);
        assert_eq!(out.as_slice(), &record.to_bytes()[..]);
    }

    #[test]
    fn test_long_name_truncated_to_255() {
        let name = "f".repeat(300);
        let record = sample(&name);
        assert_eq!(record.function_name().len(), FUNCTION_NAME_LEN - 1);
        assert_eq!(record.function_name_bytes()[FUNCTION_NAME_LEN - 1], 0);

        let exact = "g".repeat(FUNCTION_NAME_LEN);
        assert_eq!(sample(&exact).function_name().len(), FUNCTION_NAME_LEN - 1);
    }

    #[test]
    fn test_name_of_255_bytes_kept_whole() {
        let name = "h".repeat(FUNCTION_NAME_LEN - 1);
        assert_eq!(sample(&name).function_name(), name.as_str());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            Record::new(0, 0, 0, 0, b""),
            Err(ProvError::NameRejected(_))
        ));
        assert!(matches!(
            Record::new(0, 0, 0, 0, b"\0tail"),
            Err(ProvError::NameRejected(_))
        ));
    }

    #[test]
    fn test_name_stops_at_nul() {
        let record = Record::new(0, 0, 0, 0, b"recv\0garbage").unwrap();
        assert_eq!(record.function_name(), "recv");
    }

    #[test]
    fn test_decode_then_encode_is_identity() {
        // Arbitrary bytes, including a name field without a terminator.
        let mut bytes = [0u8; RECORD_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i * 31 % 251) as u8;
        }
        assert_eq!(Record::from_bytes(&bytes).to_bytes(), bytes);
    }

    #[test]
    fn test_encode_then_decode_is_identity() {
        let record = sample("pthread_create");
        assert_eq!(Record::from_bytes(&record.to_bytes()), record);
    }

    #[test]
    fn test_display_format() {
        let line = sample("read").to_string();
        assert_eq!(
            line,
            "Record[time=1700000000123, pid=4242, call_site_tag=-7, exit=512, function_name=read]"
        );
    }
}
