//! Fixed-width field encoding
//!
//! 8-byte big-endian integers and 9-byte civil UTC timestamps.

use bytes::{Buf, BufMut};
use crate::error::MalformedRecord;
use crate::timestamp::Timestamp;

/// Encoded width of a slot id or counter
pub const U64_SIZE: usize = 8;

/// Encoded width of a timestamp
pub const TIMESTAMP_SIZE: usize = 9;

// =============================================================================
// Integers
// =============================================================================

/// Encode `value` as 8 big-endian bytes
pub fn encode_u64(value: u64) -> [u8; U64_SIZE] {
    value.to_be_bytes()
}

/// Decode an 8-byte big-endian integer.
///
/// Returns `None` if `bytes` is not exactly 8 bytes long.
pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let raw: [u8; U64_SIZE] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

// =============================================================================
// Timestamps
// =============================================================================

/// Append the 9-byte form of `timestamp` to `buf`
pub fn encode_timestamp<B: BufMut>(buf: &mut B, timestamp: &Timestamp) {
    let civil = timestamp.civil();

    buf.put_i32(timestamp.year_offset());
    buf.put_u8(civil.month - 1);
    buf.put_u8(civil.day);
    buf.put_u8(civil.hour);
    buf.put_u8(civil.minute);
    buf.put_u8(civil.second);
}

/// Decode a 9-byte timestamp.
///
/// Every year offset is accepted. Fields are normalized the way `timegm`
/// does it: a month past December rolls into the next year, day 0 is the
/// last day of the previous month, and oversized hour/minute/second values
/// carry forward.
pub fn decode_timestamp(bytes: &[u8]) -> Result<Timestamp, MalformedRecord> {
    if bytes.len() < TIMESTAMP_SIZE {
        return Err(MalformedRecord::TruncatedEntry);
    }
    let mut buf = &bytes[..TIMESTAMP_SIZE];

    let year_offset = buf.get_i32();
    let month0 = buf.get_u8();
    let day = buf.get_u8();
    let hour = buf.get_u8();
    let minute = buf.get_u8();
    let second = buf.get_u8();

    Timestamp::from_fields(year_offset, month0, day, hour, minute, second)
        .ok_or(MalformedRecord::TimestampOutOfRange)
}
