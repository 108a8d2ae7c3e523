//! Record blob encoding and decoding

use bytes::BufMut;

use crate::error::MalformedRecord;
use crate::record::{Entry, Record};

use super::primitives::{decode_timestamp, encode_timestamp, TIMESTAMP_SIZE};

/// Smallest well-formed entry: a timestamp and two empty terminated strings
pub const ENTRY_MIN_SIZE: usize = TIMESTAMP_SIZE + 2;

/// Serialize a record to its blob form.
///
/// Keys and text fields never contain NUL (enforced when a [`Record`] or
/// [`Entry`] is built), so encoding cannot fail.
pub fn encode_record(record: &Record) -> Vec<u8> {
    let size = record.key().len()
        + 1
        + record
            .entries()
            .iter()
            .map(|e| TIMESTAMP_SIZE + e.author().len() + e.description().len() + 2)
            .sum::<usize>();

    let mut buf = Vec::with_capacity(size);
    buf.put_slice(record.key().as_bytes());
    buf.put_u8(0);

    for entry in record.entries() {
        encode_timestamp(&mut buf, &entry.timestamp());
        buf.put_slice(entry.author().as_bytes());
        buf.put_u8(0);
        buf.put_slice(entry.description().as_bytes());
        buf.put_u8(0);
    }

    debug_assert_eq!(buf.len(), size);
    buf
}

/// Deserialize a record blob.
///
/// Entries are consumed while at least [`ENTRY_MIN_SIZE`] bytes remain; any
/// bytes left after that are reported as [`MalformedRecord::TrailingBytes`].
pub fn decode_record(bytes: &[u8]) -> Result<Record, MalformedRecord> {
    let (key, mut rest) = take_cstr(bytes).ok_or(MalformedRecord::MissingKeyTerminator)?;
    let key = into_string(key)?;

    let mut entries = Vec::new();
    while rest.len() >= ENTRY_MIN_SIZE {
        let timestamp = decode_timestamp(rest)?;
        rest = &rest[TIMESTAMP_SIZE..];

        let (author, after_author) = take_cstr(rest).ok_or(MalformedRecord::TruncatedEntry)?;
        let (description, after_description) =
            take_cstr(after_author).ok_or(MalformedRecord::TruncatedEntry)?;
        rest = after_description;

        entries.push(Entry::from_parts(
            into_string(author)?,
            into_string(description)?,
            timestamp,
        ));
    }

    if !rest.is_empty() {
        return Err(MalformedRecord::TrailingBytes {
            remaining: rest.len(),
        });
    }

    Ok(Record::from_parts(key, entries))
}

/// Split at the first NUL, returning the bytes before it and the bytes after it
fn take_cstr(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = bytes.iter().position(|&b| b == 0)?;
    Some((&bytes[..end], &bytes[end + 1..]))
}

fn into_string(bytes: &[u8]) -> Result<String, MalformedRecord> {
    String::from_utf8(bytes.to_vec()).map_err(|_| MalformedRecord::InvalidUtf8)
}
