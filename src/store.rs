//! Store Module
//!
//! The record store: case-insensitive keys mapped to records of entries,
//! persisted through a [`KvEngine`].
//!
//! ## Responsibilities
//! - Resolve keys to stable slot ids and slot ids to record blobs
//! - Create, overwrite and delete records, reclaiming slots on delete
//! - Sample a random live record
//! - Sync the engine at the end of every mutating operation
//!
//! ## Lookup Path
//! ```text
//! "Foo" ──lowercase──▶ "foo" ──get──▶ slot id (8) ──get──▶ record blob
//! ```

use std::cell::{Cell, RefCell};
use std::path::Path;

use parking_lot::ReentrantMutex;
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::allocator::keys::slot_key;
use crate::allocator::{bookkeeping_u64, SlotAllocator};
use crate::codec::{decode_record, encode_record, encode_u64};
use crate::config::Config;
use crate::engine::{KvEngine, SqliteEngine};
use crate::error::{InfoDbError, Result};
use crate::record::{normalize_key, Entry, Record};

/// Snapshot of the slot bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Slot ids ever carved out, including freed ones
    pub capacity: u64,

    /// Keys mapped to a live record
    pub used: u64,

    /// Slot ids waiting on the free list
    pub free: u64,
}

/// The record store
///
/// ## Concurrency Model: one reentrant lock
///
/// Every public operation holds `inner` for its full duration, so other
/// threads never see a half-applied mapping, counter or free-list update.
/// The lock is reentrant: `append` and `remove_entry` hold it while calling
/// `fetch` and `upsert`, which take it again on the same thread.
///
/// The allocator sits in a `RefCell` because a reentrant guard only hands
/// out shared access. Borrows never span a nested store call.
pub struct Store<E: KvEngine = SqliteEngine> {
    inner: ReentrantMutex<Inner<E>>,
    config: Config,
}

struct Inner<E> {
    engine: E,
    allocator: RefCell<SlotAllocator>,
    closed: Cell<bool>,
}

impl Store<SqliteEngine> {
    /// Open or create a store at `path` with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open_with_config(config)
    }

    /// Open or create a store as described by `config`
    pub fn open_with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let engine = SqliteEngine::open(&config)?;
        info!(path = %config.path.display(), "database file opened");
        Self::with_engine(engine, config)
    }
}

impl<E: KvEngine> Store<E> {
    /// Open a store over an already opened engine.
    ///
    /// Absent counters are initialized to zero. Fails with
    /// [`InfoDbError::Corruption`] if the stored counters are inconsistent.
    pub fn with_engine(engine: E, config: Config) -> Result<Self> {
        config.validate()?;
        let allocator = SlotAllocator::load(&engine)?;

        info!(
            capacity = allocator.capacity(),
            used = allocator.used(),
            "record store ready"
        );

        Ok(Self {
            inner: ReentrantMutex::new(Inner {
                engine,
                allocator: RefCell::new(allocator),
                closed: Cell::new(false),
            }),
            config,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up the record for `key`, ignoring case.
    ///
    /// Returns `None` if the key is unmapped. A stored blob that fails to
    /// decode is reported as [`InfoDbError::MalformedRecord`] and left as is.
    pub fn fetch(&self, key: &str) -> Result<Option<Record>> {
        check_key(key)?;
        let normalized = normalize_key(key);

        let inner = self.inner.lock();
        let Some(slot) = lookup_slot(&inner.engine, &normalized)? else {
            return Ok(None);
        };

        match inner.engine.get(&slot_key(slot))? {
            Some(blob) => decode_blob(&blob, slot).map(Some),
            None => {
                warn!(key = %normalized, slot, "key is mapped to a missing record");
                Ok(None)
            }
        }
    }

    /// Return a live record chosen uniformly at random, or `None` if the
    /// store is empty.
    ///
    /// Slot ids are drawn from the OS random source over the whole slot
    /// space until one holds a record, so the expected number of draws is
    /// `capacity / used`. Gives up with
    /// [`InfoDbError::RandomSampleExhausted`] after
    /// [`Config::max_random_draws`] misses, if set.
    pub fn fetch_random(&self) -> Result<Option<Record>> {
        let inner = self.inner.lock();
        let (capacity, used) = {
            let allocator = inner.allocator.borrow();
            (allocator.capacity(), allocator.used())
        };
        if used == 0 || capacity == 0 {
            return Ok(None);
        }

        let mut rng = OsRng;
        let mut draws = 0u64;
        loop {
            if let Some(limit) = self.config.max_random_draws {
                if draws >= limit {
                    warn!(draws, capacity, used, "random sampling gave up");
                    return Err(InfoDbError::RandomSampleExhausted { draws });
                }
            }
            draws += 1;

            let slot = rng.gen_range(0..capacity);
            if let Some(blob) = inner.engine.get(&slot_key(slot))? {
                debug!(slot, draws, "sampled record");
                return decode_blob(&blob, slot).map(Some);
            }
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `record` under its key, replacing whatever was there.
    ///
    /// - new key, entries: allocate a slot, map the key, write the blob
    /// - new key, no entries: nothing to do
    /// - known key, entries: overwrite the blob in place
    /// - known key, no entries: unmap the key and free its slot
    pub fn upsert(&self, record: &Record) -> Result<()> {
        check_key(record.key())?;
        let normalized = record.normalized_key();

        let inner = self.inner.lock();
        let engine = &inner.engine;

        match lookup_slot(engine, &normalized)? {
            None if record.is_empty() => return Ok(()),
            None => {
                let slot = inner.allocator.borrow_mut().allocate(engine)?;
                engine.put(normalized.as_bytes(), &encode_u64(slot))?;
                engine.put(&slot_key(slot), &encode_record(record))?;
                debug!(key = %normalized, slot, "created record");
            }
            Some(slot) if record.is_empty() => {
                engine.delete(normalized.as_bytes())?;
                inner.allocator.borrow_mut().free(engine, slot)?;
                debug!(key = %normalized, slot, "deleted record");
            }
            Some(slot) => {
                engine.put(&slot_key(slot), &encode_record(record))?;
                debug!(key = %normalized, slot, entries = record.len(), "updated record");
            }
        }

        engine.sync()
    }

    /// Append `entry` to the record for `key`, creating the record if needed.
    ///
    /// An existing record keeps the case of its key as first stored.
    pub fn append(&self, key: &str, entry: Entry) -> Result<()> {
        let _guard = self.inner.lock();

        let mut record = match self.fetch(key)? {
            Some(record) => record,
            None => Record::new(key)?,
        };
        record.push(entry);
        self.upsert(&record)
    }

    /// Delete the record for `key`. Deleting an absent key succeeds.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.upsert(&Record::new(key)?)
    }

    /// Remove every entry of `key` whose description is `description`.
    ///
    /// Returns `false` if nothing matched. Removing the last entry deletes
    /// the record.
    pub fn remove_entry(&self, key: &str, description: &str) -> Result<bool> {
        let _guard = self.inner.lock();

        let Some(mut record) = self.fetch(key)? else {
            return Ok(false);
        };
        if record.remove_description(description) == 0 {
            return Ok(false);
        }
        self.upsert(&record)?;
        Ok(true)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of keys holding a live record
    pub fn len(&self) -> u64 {
        self.inner.lock().allocator.borrow().used()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the highest slot id ever allocated
    pub fn capacity(&self) -> u64 {
        self.inner.lock().allocator.borrow().capacity()
    }

    /// Counters plus the current free-list length
    pub fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.lock();
        let allocator = inner.allocator.borrow();
        let free = allocator.free_slots(&inner.engine)?.len() as u64;

        Ok(StoreStats {
            capacity: allocator.capacity(),
            used: allocator.used(),
            free,
        })
    }

    /// Reclaimed slot ids, most recently freed first
    pub fn free_slots(&self) -> Result<Vec<u64>> {
        let inner = self.inner.lock();
        let allocator = inner.allocator.borrow();
        allocator.free_slots(&inner.engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flush and release the engine
    pub fn close(self) -> Result<()> {
        let inner = self.inner.lock();
        inner.closed.set(true);
        inner.engine.close()?;
        info!(used = inner.allocator.borrow().used(), "record store closed");
        Ok(())
    }
}

impl<E: KvEngine> Drop for Store<E> {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        if inner.closed.get() {
            return;
        }
        if let Err(e) = inner.engine.close() {
            warn!(error = %e, "failed to flush record store on drop");
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(InfoDbError::InvalidInput("key is empty".to_string()));
    }
    if key.contains('\0') {
        return Err(InfoDbError::InvalidInput(
            "key contains a NUL byte".to_string(),
        ));
    }
    Ok(())
}

/// Resolve a normalized key to its slot id
fn lookup_slot<E: KvEngine>(engine: &E, normalized: &str) -> Result<Option<u64>> {
    match engine.get(normalized.as_bytes())? {
        Some(raw) => bookkeeping_u64(&raw, "key mapping").map(Some),
        None => Ok(None),
    }
}

fn decode_blob(blob: &[u8], slot: u64) -> Result<Record> {
    decode_record(blob).map_err(|e| {
        warn!(slot, error = %e, "stored record is malformed");
        InfoDbError::MalformedRecord(e)
    })
}
