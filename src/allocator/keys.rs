//! Reserved engine keys
//!
//! Bookkeeping lives in the same keyspace as user data. Every internal key
//! starts with a zero byte; user keys cannot contain NUL, so the two never
//! meet. Record blobs sit under the bare 8-byte slot id.
//!
//! ```text
//! [0, 0]            → capacity
//! [0, 1]            → used
//! [0, 2]            → free-list head
//! [0, 2] + id (8)   → free-list node: next free id after `id`
//! id (8)            → record blob
//! ```

use crate::codec::{encode_u64, U64_SIZE};

pub const CAPACITY_KEY: [u8; 2] = [0, 0];
pub const USED_KEY: [u8; 2] = [0, 1];
pub const FREE_LIST_HEAD_KEY: [u8; 2] = [0, 2];

/// Key of the free-list node for `slot`
pub fn free_list_node_key(slot: u64) -> [u8; 2 + U64_SIZE] {
    let mut key = [0u8; 2 + U64_SIZE];
    key[..2].copy_from_slice(&FREE_LIST_HEAD_KEY);
    key[2..].copy_from_slice(&encode_u64(slot));
    key
}

/// Key the record blob for `slot` is stored under
pub fn slot_key(slot: u64) -> [u8; U64_SIZE] {
    encode_u64(slot)
}
