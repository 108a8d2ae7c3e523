//! In-memory engine
//!
//! BTreeMap behind a RwLock. Clones share the same map, which lets a test
//! keep a handle for direct inspection while a store owns another.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{InfoDbError, Result};

use super::KvEngine;

/// Volatile engine with optional fault injection
#[derive(Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_syncs: AtomicBool,
    fail_read_key: RwLock<Option<Vec<u8>>>,
    syncs: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `put`, `delete` and `sync` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make only `sync` fail; `put` and `delete` still apply
    pub fn set_fail_syncs(&self, fail: bool) {
        self.inner.fail_syncs.store(fail, Ordering::SeqCst);
    }

    /// Make `get` fail for this one key, or for no key with `None`
    pub fn set_fail_reads_of(&self, key: Option<&[u8]>) {
        *self.inner.fail_read_key.write() = key.map(<[u8]>::to_vec);
    }

    /// Read a key, ignoring injected faults
    pub fn raw_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.data.read().get(key).cloned()
    }

    /// Write a key, ignoring injected faults
    pub fn raw_put(&self, key: &[u8], value: &[u8]) {
        self.inner.data.write().insert(key.to_vec(), value.to_vec());
    }

    /// Remove a key, ignoring injected faults
    pub fn raw_delete(&self, key: &[u8]) {
        self.inner.data.write().remove(key);
    }

    /// All keys in order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.data.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.read().is_empty()
    }

    /// Number of successful `sync` calls
    pub fn sync_count(&self) -> u64 {
        self.inner.syncs.load(Ordering::SeqCst)
    }

    fn check_writes(&self) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(InfoDbError::Engine("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl KvEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.inner.fail_reads.load(Ordering::SeqCst)
            || self.inner.fail_read_key.read().as_deref() == Some(key)
        {
            return Err(InfoDbError::Engine("injected read failure".to_string()));
        }
        Ok(self.raw_get(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_writes()?;
        self.raw_put(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_writes()?;
        self.raw_delete(key);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.check_writes()?;
        if self.inner.fail_syncs.load(Ordering::SeqCst) {
            return Err(InfoDbError::Engine("injected sync failure".to_string()));
        }
        self.inner.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
