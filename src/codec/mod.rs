//! Codec Module
//!
//! Binary encoding of records and of the fixed-width fields stored in the
//! engine.
//!
//! ## Record Blob Format
//! ```text
//! ┌───────────┬───┬──────────────────────────────────────────────────┐
//! │ Key       │ 0 │ Entry*                                           │
//! └───────────┴───┴──────────────────────────────────────────────────┘
//!
//! Entry:
//! ┌───────────────┬──────────┬───┬───────────────┬───┐
//! │ Timestamp (9) │ Author   │ 0 │ Description   │ 0 │
//! └───────────────┴──────────┴───┴───────────────┴───┘
//! ```
//!
//! ### Timestamp (9 bytes, UTC)
//! ```text
//! ┌──────────────┬─────────┬───────┬────────┬──────────┬──────────┐
//! │ Year-1900 (4)│ Mon0 (1)│ Day(1)│ Hour(1)│ Minute(1)│ Second(1)│
//! └──────────────┴─────────┴───────┴────────┴──────────┴──────────┘
//! ```
//! Year is a signed big-endian offset from 1900, month is 0-based. Every
//! offset in the `i32` range decodes.
//!
//! ### Integers
//! Slot ids and counters are 8-byte big-endian unsigned integers.

mod primitives;
mod record;

pub use primitives::{
    decode_timestamp, decode_u64, encode_timestamp, encode_u64, TIMESTAMP_SIZE, U64_SIZE,
};
pub use record::{decode_record, encode_record, ENTRY_MIN_SIZE};
