//! Slot Allocator
//!
//! Hands out 64-bit slot ids for record blobs and takes them back when a
//! record is deleted.
//!
//! ## Responsibilities
//! - Grow the id space one slot at a time (`capacity`)
//! - Keep reclaimed ids on a LIFO free list threaded through the engine
//! - Track how many slots hold a live record (`used`)
//!
//! Every counter and free-list change is written to the engine with `put`
//! as it happens. The caller issues the `sync` once its whole logical
//! operation is done, so a crash between steps can leave the bookkeeping
//! behind; [`SlotAllocator::load`] catches the detectable case
//! (`used > capacity`) and refuses to open.
//!
//! ## Concurrency
//! The allocator holds no lock of its own. It is only ever reached from
//! inside the store lock.

pub mod keys;

use tracing::{debug, error};

use crate::codec::{decode_u64, encode_u64};
use crate::engine::KvEngine;
use crate::error::{InfoDbError, Result};

use keys::{free_list_node_key, slot_key, CAPACITY_KEY, FREE_LIST_HEAD_KEY, USED_KEY};

/// Persistent slot id allocator with a reclaimable free list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAllocator {
    /// One past the highest slot id ever handed out
    capacity: u64,

    /// Slots currently holding a live record
    used: u64,
}

impl SlotAllocator {
    /// Read the counters from `engine`, initializing absent ones to zero.
    ///
    /// Fails with [`InfoDbError::Corruption`] if `used > capacity`.
    pub fn load<E: KvEngine>(engine: &E) -> Result<Self> {
        let mut needs_sync = false;
        let capacity = load_or_init(engine, &CAPACITY_KEY, "capacity", &mut needs_sync)?;
        let used = load_or_init(engine, &USED_KEY, "used", &mut needs_sync)?;

        if used > capacity {
            error!(capacity, used, "slot counters are inconsistent");
            return Err(InfoDbError::Corruption(format!(
                "used slots ({}) exceed capacity ({})",
                used, capacity
            )));
        }

        if needs_sync {
            engine.sync()?;
        }

        Ok(Self { capacity, used })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Take a slot id, preferring the most recently freed one
    pub fn allocate<E: KvEngine>(&mut self, engine: &E) -> Result<u64> {
        let slot = match engine.get(&FREE_LIST_HEAD_KEY)? {
            Some(raw) => {
                let head = bookkeeping_u64(&raw, "free-list head")?;
                if head >= self.capacity {
                    return Err(InfoDbError::Corruption(format!(
                        "free-list head {} is outside capacity {}",
                        head, self.capacity
                    )));
                }

                let node_key = free_list_node_key(head);
                match engine.get(&node_key)? {
                    Some(next) => {
                        bookkeeping_u64(&next, "free-list node")?;
                        engine.put(&FREE_LIST_HEAD_KEY, &next)?;
                        engine.delete(&node_key)?;
                    }
                    None => engine.delete(&FREE_LIST_HEAD_KEY)?,
                }

                debug!(slot = head, "reusing freed slot");
                head
            }
            None => {
                let slot = self.capacity;
                let capacity = slot
                    .checked_add(1)
                    .ok_or_else(|| InfoDbError::Corruption("slot id space exhausted".to_string()))?;
                engine.put(&CAPACITY_KEY, &encode_u64(capacity))?;
                self.capacity = capacity;

                debug!(slot, capacity, "grew slot space");
                slot
            }
        };

        let used = self.used + 1;
        engine.put(&USED_KEY, &encode_u64(used))?;
        self.used = used;

        Ok(slot)
    }

    /// Return `slot` to the free list and delete its record blob
    pub fn free<E: KvEngine>(&mut self, engine: &E, slot: u64) -> Result<()> {
        let used = self.used.checked_sub(1).ok_or_else(|| {
            InfoDbError::Corruption(format!("freeing slot {} with no slots in use", slot))
        })?;

        let node_key = free_list_node_key(slot);
        match engine.get(&FREE_LIST_HEAD_KEY)? {
            Some(previous) => {
                bookkeeping_u64(&previous, "free-list head")?;
                engine.put(&node_key, &previous)?;
            }
            None => engine.delete(&node_key)?,
        }
        engine.put(&FREE_LIST_HEAD_KEY, &encode_u64(slot))?;
        engine.delete(&slot_key(slot))?;

        engine.put(&USED_KEY, &encode_u64(used))?;
        self.used = used;

        debug!(slot, used, "freed slot");
        Ok(())
    }

    /// Walk the free list from its head, most recently freed first
    pub fn free_slots<E: KvEngine>(&self, engine: &E) -> Result<Vec<u64>> {
        let mut slots = Vec::new();
        let mut next = match engine.get(&FREE_LIST_HEAD_KEY)? {
            Some(raw) => Some(bookkeeping_u64(&raw, "free-list head")?),
            None => None,
        };

        while let Some(slot) = next {
            // A list longer than the id space has a cycle
            if slots.len() as u64 >= self.capacity {
                return Err(InfoDbError::Corruption(
                    "free list is longer than the slot space".to_string(),
                ));
            }
            slots.push(slot);
            next = match engine.get(&free_list_node_key(slot))? {
                Some(raw) => Some(bookkeeping_u64(&raw, "free-list node")?),
                None => None,
            };
        }

        Ok(slots)
    }
}

fn load_or_init<E: KvEngine>(
    engine: &E,
    key: &[u8],
    what: &str,
    needs_sync: &mut bool,
) -> Result<u64> {
    match engine.get(key)? {
        Some(raw) => bookkeeping_u64(&raw, what),
        None => {
            engine.put(key, &encode_u64(0))?;
            *needs_sync = true;
            Ok(0)
        }
    }
}

/// Decode an 8-byte bookkeeping value, treating any other width as corruption
pub(crate) fn bookkeeping_u64(raw: &[u8], what: &str) -> Result<u64> {
    decode_u64(raw).ok_or_else(|| {
        InfoDbError::Corruption(format!(
            "{} value is {} bytes, expected 8",
            what,
            raw.len()
        ))
    })
}
