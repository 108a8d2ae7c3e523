//! Engine Module
//!
//! The ordered byte-string key/value engine the record store is built on.
//!
//! ## Responsibilities
//! - Point `get`/`put`/`delete` on raw byte keys and values
//! - `sync` makes every write issued so far durable
//!
//! The store never relies on anything else: no range scans, no secondary
//! indexes, no multi-key transactions. Writes between two `sync` calls may be
//! lost on a crash, but never reordered past a completed `sync`.
//!
//! ## Implementations
//! - [`SqliteEngine`]: durable, single file, keys kept in a B-tree
//! - [`MemoryEngine`]: volatile `BTreeMap`, cheap to clone and to fault on demand

mod memory;
mod sqlite;

pub use memory::MemoryEngine;
pub use sqlite::SqliteEngine;

use crate::error::Result;

/// Ordered byte-string key/value storage
pub trait KvEngine: Send {
    /// Look up `key`, returning `None` if it is absent
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Make all preceding writes durable
    fn sync(&self) -> Result<()>;

    /// Flush and release resources. The engine must not be used afterwards.
    fn close(&self) -> Result<()> {
        self.sync()
    }
}
