//! Tests for Store
//!
//! These tests verify:
//! - fetch/upsert/append round trips and case-insensitive lookup
//! - Record deletion and slot reuse
//! - Random sampling
//! - Malformed blobs, engine failures and invalid input
//! - Persistence through the SQLite engine

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use infodb::allocator::keys::{slot_key, CAPACITY_KEY, FREE_LIST_HEAD_KEY, USED_KEY};
use infodb::codec::{decode_u64, encode_u64};
use infodb::{
    Config, Entry, InfoDbError, KvEngine, MemoryEngine, Record, SqliteEngine, Store, Timestamp,
};
use proptest::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_memory_store() -> (MemoryEngine, Store<MemoryEngine>) {
    let engine = MemoryEngine::new();
    let store = Store::with_engine(engine.clone(), Config::default()).unwrap();
    (engine, store)
}

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("info.db")).unwrap();
    (temp_dir, store)
}

fn ts(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, 12, 30, 0).unwrap()
}

fn entry(author: &str, description: &str) -> Entry {
    Entry::with_timestamp(author, description, ts(2024, 5, 17)).unwrap()
}

fn mapped_slot(engine: &MemoryEngine, normalized_key: &str) -> Option<u64> {
    engine
        .raw_get(normalized_key.as_bytes())
        .map(|raw| decode_u64(&raw).unwrap())
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_upsert_fetch_roundtrip() {
    let (_engine, store) = setup_memory_store();
    let record = Record::with_entries(
        "Rust",
        vec![entry("alice", "a language"), entry("bob", "also a fungus")],
    )
    .unwrap();

    store.upsert(&record).unwrap();

    assert_eq!(store.fetch("Rust").unwrap(), Some(record));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_fetch_unmapped_key() {
    let (_engine, store) = setup_memory_store();

    assert_eq!(store.fetch("nothing").unwrap(), None);
}

#[test]
fn test_append_to_empty_store_ignores_case() {
    let (_engine, store) = setup_memory_store();
    let t = ts(2023, 1, 2);

    store
        .append("Foo", Entry::with_timestamp("alice", "bar", t).unwrap())
        .unwrap();

    let record = store.fetch("foo").unwrap().unwrap();
    assert_eq!(record.key(), "Foo");
    assert_eq!(record.entries().len(), 1);
    assert_eq!(record.entries()[0].author(), "alice");
    assert_eq!(record.entries()[0].description(), "bar");
    assert_eq!(record.entries()[0].timestamp(), Timestamp::from(t));
}

#[test]
fn test_append_keeps_insertion_order_and_original_case() {
    let (_engine, store) = setup_memory_store();

    store.append("BSD", entry("alice", "first")).unwrap();
    store.append("bsd", entry("bob", "second")).unwrap();
    store
        .append("bsd", Entry::with_timestamp("carol", "third", ts(1990, 1, 1)).unwrap())
        .unwrap();

    let record = store.fetch("Bsd").unwrap().unwrap();
    let descriptions: Vec<_> = record.entries().iter().map(|e| e.description()).collect();

    assert_eq!(record.key(), "BSD");
    assert_eq!(descriptions, vec!["first", "second", "third"]);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_upsert_overwrite_keeps_slot_and_counters() {
    let (engine, store) = setup_memory_store();
    store.append("key", entry("alice", "one")).unwrap();
    let slot = mapped_slot(&engine, "key").unwrap();
    let capacity = store.capacity();

    let replacement = Record::with_entries("KEY", vec![entry("bob", "two")]).unwrap();
    store.upsert(&replacement).unwrap();

    assert_eq!(mapped_slot(&engine, "key"), Some(slot));
    assert_eq!(store.capacity(), capacity);
    assert_eq!(store.len(), 1);
    assert_eq!(store.fetch("key").unwrap(), Some(replacement));
}

#[test]
fn test_every_mutation_syncs() {
    let (engine, store) = setup_memory_store();
    let before = engine.sync_count();

    store.append("a", entry("alice", "one")).unwrap();
    store.append("a", entry("alice", "two")).unwrap();
    store.remove("a").unwrap();

    assert_eq!(engine.sync_count(), before + 3);
}

// =============================================================================
// Deletion Tests
// =============================================================================

#[test]
fn test_upsert_empty_deletes_record() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "gone soon")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();

    store.upsert(&Record::new("X").unwrap()).unwrap();

    assert_eq!(store.fetch("x").unwrap(), None);
    assert_eq!(store.len(), 0);
    assert_eq!(engine.raw_get(b"x"), None);
    assert_eq!(engine.raw_get(&slot_key(slot)), None);
    assert_eq!(store.free_slots().unwrap(), vec![slot]);
}

#[test]
fn test_upsert_empty_on_unmapped_key_is_noop() {
    let (engine, store) = setup_memory_store();
    let keys_before = engine.keys();
    let syncs_before = engine.sync_count();

    store.upsert(&Record::new("ghost").unwrap()).unwrap();

    assert_eq!(engine.keys(), keys_before);
    assert_eq!(engine.sync_count(), syncs_before);
    assert_eq!(store.capacity(), 0);
}

#[test]
fn test_deleted_slot_is_reused_by_next_key() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "one")).unwrap();
    let x_slot = mapped_slot(&engine, "x").unwrap();

    store.upsert(&Record::new("x").unwrap()).unwrap();
    assert_eq!(store.fetch("x").unwrap(), None);

    store.append("y", entry("bob", "two")).unwrap();

    assert_eq!(mapped_slot(&engine, "y"), Some(x_slot));
    assert_eq!(store.capacity(), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_remove_entry_matches_description_only() {
    let (_engine, store) = setup_memory_store();
    store.append("tea", entry("alice", "hot")).unwrap();
    store.append("tea", entry("bob", "leaves")).unwrap();
    store
        .append("tea", Entry::with_timestamp("carol", "hot", ts(2001, 9, 9)).unwrap())
        .unwrap();

    assert!(store.remove_entry("TEA", "hot").unwrap());

    let record = store.fetch("tea").unwrap().unwrap();
    assert_eq!(record.entries().len(), 1);
    assert_eq!(record.entries()[0].description(), "leaves");
}

#[test]
fn test_remove_entry_last_entry_frees_slot() {
    let (_engine, store) = setup_memory_store();
    store.append("solo", entry("alice", "only")).unwrap();

    assert!(store.remove_entry("solo", "only").unwrap());

    assert_eq!(store.fetch("solo").unwrap(), None);
    assert_eq!(store.len(), 0);
    assert_eq!(store.free_slots().unwrap().len(), 1);
}

#[test]
fn test_remove_entry_without_match() {
    let (_engine, store) = setup_memory_store();
    store.append("solo", entry("alice", "only")).unwrap();

    assert!(!store.remove_entry("solo", "other").unwrap());
    assert!(!store.remove_entry("missing", "only").unwrap());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_used_tracks_live_keys() {
    let (_engine, store) = setup_memory_store();
    let mut live = std::collections::HashSet::new();

    for i in 0..30 {
        let key = format!("key{}", i % 7);
        if i % 4 == 3 {
            store.remove(&key).unwrap();
            live.remove(&key);
        } else {
            store.append(&key, entry("alice", &format!("v{}", i))).unwrap();
            live.insert(key);
        }
        assert_eq!(store.len(), live.len() as u64);

        let stats = store.stats().unwrap();
        assert_eq!(stats.capacity, stats.used + stats.free);
    }
}

// =============================================================================
// Random Sampling Tests
// =============================================================================

#[test]
fn test_fetch_random_empty_store() {
    let (_engine, store) = setup_memory_store();

    assert_eq!(store.fetch_random().unwrap(), None);
}

#[test]
fn test_fetch_random_single_record() {
    let (_engine, store) = setup_memory_store();
    store.append("only", entry("alice", "one")).unwrap();

    for _ in 0..10 {
        assert_eq!(store.fetch_random().unwrap().unwrap().key(), "only");
    }
}

#[test]
fn test_fetch_random_after_everything_deleted() {
    let (_engine, store) = setup_memory_store();
    store.append("a", entry("alice", "one")).unwrap();
    store.append("b", entry("alice", "two")).unwrap();
    store.remove("a").unwrap();
    store.remove("b").unwrap();

    assert_eq!(store.capacity(), 2);
    assert_eq!(store.fetch_random().unwrap(), None);
}

#[test]
fn test_fetch_random_is_uniform_over_live_records() {
    let (_engine, store) = setup_memory_store();

    // Ten slots, every other one freed
    for i in 0..10 {
        store.append(&format!("k{}", i), entry("alice", "x")).unwrap();
    }
    for i in (0..10).step_by(2) {
        store.remove(&format!("k{}", i)).unwrap();
    }
    assert_eq!(store.len(), 5);

    let trials = 5_000;
    let mut counts: HashMap<String, u64> = HashMap::new();
    for _ in 0..trials {
        let record = store.fetch_random().unwrap().unwrap();
        *counts.entry(record.key().to_string()).or_default() += 1;
    }

    assert_eq!(counts.len(), 5);
    let expected = trials as f64 / 5.0;
    let chi_square: f64 = counts
        .values()
        .map(|&observed| {
            let diff = observed as f64 - expected;
            diff * diff / expected
        })
        .sum();

    // 4 degrees of freedom; p = 0.0001 sits near 23.5
    assert!(chi_square < 30.0, "chi-square {} too large", chi_square);
}

#[test]
fn test_fetch_random_gives_up_after_bound() {
    let engine = MemoryEngine::new();
    let config = Config::builder().max_random_draws(Some(50)).build();
    let store = Store::with_engine(engine.clone(), config).unwrap();
    store.append("lost", entry("alice", "one")).unwrap();

    // Counters say one record is live, but its blob is gone
    let slot = mapped_slot(&engine, "lost").unwrap();
    engine.raw_delete(&slot_key(slot));

    let result = store.fetch_random();

    assert!(matches!(
        result,
        Err(InfoDbError::RandomSampleExhausted { draws: 50 })
    ));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_truncated_blob_is_malformed_and_untouched() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "bar")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();

    let blob = engine.raw_get(&slot_key(slot)).unwrap();
    // key "x\0" + timestamp + "ali"
    let truncated = blob[..2 + 9 + 3].to_vec();
    engine.raw_put(&slot_key(slot), &truncated);

    let result = store.fetch("x");

    assert!(matches!(result, Err(InfoDbError::MalformedRecord(_))));
    assert_eq!(store.len(), 1);
    assert_eq!(store.capacity(), 1);
    assert_eq!(engine.raw_get(&slot_key(slot)), Some(truncated));
}

#[test]
fn test_malformed_blob_fails_random_fetch() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "bar")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();
    engine.raw_put(&slot_key(slot), b"no terminator");

    let result = store.fetch_random();

    assert!(matches!(result, Err(InfoDbError::MalformedRecord(_))));
}

#[test]
fn test_mapping_to_missing_blob_reads_as_absent() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "bar")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();
    engine.raw_delete(&slot_key(slot));

    assert_eq!(store.fetch("x").unwrap(), None);
}

#[test]
fn test_read_failure_propagates() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "bar")).unwrap();
    engine.set_fail_reads(true);

    assert!(matches!(store.fetch("x"), Err(InfoDbError::Engine(_))));
    assert!(matches!(store.fetch_random(), Err(InfoDbError::Engine(_))));
}

#[test]
fn test_write_failure_propagates_without_counting() {
    let (engine, store) = setup_memory_store();
    engine.set_fail_writes(true);

    let result = store.append("x", entry("alice", "bar"));

    assert!(matches!(result, Err(InfoDbError::Engine(_))));
    assert_eq!(store.len(), 0);
    assert_eq!(store.capacity(), 0);

    engine.set_fail_writes(false);
    assert_eq!(store.fetch("x").unwrap(), None);
}

#[test]
fn test_write_failure_on_overwrite_propagates() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "bar")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();
    let blob = engine.raw_get(&slot_key(slot));
    engine.set_fail_writes(true);

    let replacement = Record::with_entries("x", vec![entry("bob", "baz")]).unwrap();
    let result = store.upsert(&replacement);

    assert!(matches!(result, Err(InfoDbError::Engine(_))));
    assert_eq!(store.len(), 1);
    assert_eq!(store.capacity(), 1);
    assert_eq!(engine.raw_get(&slot_key(slot)), blob);

    engine.set_fail_writes(false);
    let record = store.fetch("x").unwrap().unwrap();
    assert_eq!(record.entries(), &[entry("alice", "bar")]);
}

#[test]
fn test_write_failure_on_delete_propagates() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "bar")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();
    engine.set_fail_writes(true);

    let result = store.remove("x");

    assert!(matches!(result, Err(InfoDbError::Engine(_))));
    assert_eq!(store.len(), 1);
    assert_eq!(store.capacity(), 1);
    assert_eq!(mapped_slot(&engine, "x"), Some(slot));

    engine.set_fail_writes(false);
    assert!(store.fetch("x").unwrap().is_some());
}

#[test]
fn test_sync_failure_propagates_after_writes_applied() {
    let (engine, store) = setup_memory_store();
    let syncs = engine.sync_count();
    engine.set_fail_syncs(true);

    let result = store.append("x", entry("alice", "bar"));

    // The puts went through and are not rolled back
    assert!(matches!(result, Err(InfoDbError::Engine(_))));
    assert_eq!(engine.sync_count(), syncs);
    assert_eq!(store.len(), 1);
    assert_eq!(mapped_slot(&engine, "x"), Some(0));

    engine.set_fail_syncs(false);
    assert_eq!(store.fetch("x").unwrap().unwrap().entries(), &[entry("alice", "bar")]);
}

#[test]
fn test_free_list_read_failure_on_remove_keeps_used() {
    let (engine, store) = setup_memory_store();
    store.append("x", entry("alice", "one")).unwrap();
    store.append("y", entry("bob", "two")).unwrap();
    let slot = mapped_slot(&engine, "x").unwrap();
    engine.set_fail_reads_of(Some(&FREE_LIST_HEAD_KEY[..]));

    let result = store.remove("x");

    assert!(matches!(result, Err(InfoDbError::Engine(_))));
    // The mapping delete already happened; the slot stays counted
    assert_eq!(mapped_slot(&engine, "x"), None);
    assert_eq!(store.len(), 2);
    assert_eq!(decode_u64(&engine.raw_get(&USED_KEY).unwrap()), Some(2));
    assert!(engine.raw_get(&slot_key(slot)).is_some());

    engine.set_fail_reads_of(None);
    assert_eq!(store.fetch("x").unwrap(), None);
    assert!(store.fetch("y").unwrap().is_some());
    assert!(store.free_slots().unwrap().is_empty());
}

#[test]
fn test_fetch_decodes_year_beyond_chrono_range() {
    let (engine, store) = setup_memory_store();
    store.append("k", entry("alice", "old")).unwrap();
    let slot = mapped_slot(&engine, "k").unwrap();

    let mut blob = engine.raw_get(&slot_key(slot)).unwrap();
    // key "k\0", then the year offset
    blob[2..6].copy_from_slice(&(-1_000_000i32).to_be_bytes());
    engine.raw_put(&slot_key(slot), &blob);

    let record = store.fetch("k").unwrap().unwrap();
    let stamp = record.entries()[0].timestamp();
    assert_eq!(stamp.year_offset(), -1_000_000);
    assert_eq!(stamp.to_datetime(), None);

    // Rewriting the record keeps the stored year intact
    store.append("k", entry("bob", "new")).unwrap();
    let rewritten = engine.raw_get(&slot_key(slot)).unwrap();
    assert_eq!(&rewritten[..blob.len()], &blob[..]);
    assert_eq!(store.fetch("k").unwrap().unwrap().entries().len(), 2);
}

#[test]
fn test_invalid_input_rejected() {
    let (engine, store) = setup_memory_store();
    let keys_before = engine.keys();

    assert!(matches!(store.fetch(""), Err(InfoDbError::InvalidInput(_))));
    assert!(matches!(store.fetch("a\0b"), Err(InfoDbError::InvalidInput(_))));
    assert!(matches!(Record::new(""), Err(InfoDbError::InvalidInput(_))));
    assert!(matches!(
        Entry::new("al\0ice", "x"),
        Err(InfoDbError::InvalidInput(_))
    ));
    assert!(matches!(
        Entry::new("alice", "x\0"),
        Err(InfoDbError::InvalidInput(_))
    ));
    assert!(matches!(
        store.append("", entry("alice", "x")),
        Err(InfoDbError::InvalidInput(_))
    ));

    assert_eq!(engine.keys(), keys_before);
}

#[test]
fn test_open_rejects_corrupt_counters() {
    let engine = MemoryEngine::new();
    engine.raw_put(&CAPACITY_KEY, &encode_u64(2));
    engine.raw_put(&USED_KEY, &encode_u64(3));

    let result = Store::with_engine(engine, Config::default());

    assert!(matches!(result, Err(InfoDbError::Corruption(_))));
}

#[test]
fn test_config_rejects_zero_draw_bound() {
    let config = Config::builder().max_random_draws(Some(0)).build();

    let result = Store::with_engine(MemoryEngine::new(), config);

    assert!(matches!(result, Err(InfoDbError::Config(_))));
}

// =============================================================================
// SQLite Persistence Tests
// =============================================================================

#[test]
fn test_sqlite_roundtrip() {
    let (_temp, store) = setup_temp_store();

    store.append("Foo", entry("alice", "bar")).unwrap();

    let record = store.fetch("FOO").unwrap().unwrap();
    assert_eq!(record.key(), "Foo");
    assert_eq!(record.entries(), &[entry("alice", "bar")]);
}

#[test]
fn test_sqlite_reopen_preserves_records_and_counters() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("info.db");

    {
        let store = Store::open(&path).unwrap();
        store.append("a", entry("alice", "one")).unwrap();
        store.append("b", entry("bob", "two")).unwrap();
        store.append("a", entry("carol", "three")).unwrap();
        store.close().unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.capacity(), 2);
    assert_eq!(store.fetch("a").unwrap().unwrap().entries().len(), 2);
    assert_eq!(store.fetch("b").unwrap().unwrap().entries()[0].author(), "bob");
}

#[test]
fn test_sqlite_free_list_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("info.db");

    {
        let store = Store::open(&path).unwrap();
        store.append("a", entry("alice", "one")).unwrap();
        store.append("b", entry("bob", "two")).unwrap();
        store.remove("a").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.free_slots().unwrap(), vec![0]);

    store.append("c", entry("carol", "three")).unwrap();
    assert_eq!(store.capacity(), 2);
    assert!(store.free_slots().unwrap().is_empty());
}

#[test]
fn test_sqlite_drop_without_close_persists() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("info.db");

    {
        let store = Store::open(&path).unwrap();
        store.append("kept", entry("alice", "one")).unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert!(store.fetch("kept").unwrap().is_some());
}

#[test]
fn test_sqlite_creates_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("info.db");

    let _store = Store::open(&path).unwrap();

    assert!(path.exists());
}

#[test]
fn test_sqlite_writes_after_commit_reopen_transaction() {
    let engine = SqliteEngine::open_in_memory().unwrap();
    assert!(engine.in_transaction());

    // Leaves the connection in autocommit mode
    engine.close().unwrap();
    assert!(!engine.in_transaction());

    engine.put(b"k", b"v").unwrap();
    assert!(engine.in_transaction());
    engine.sync().unwrap();
    assert!(engine.in_transaction());
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));

    engine.close().unwrap();
    engine.delete(b"k").unwrap();
    assert!(engine.in_transaction());
    assert_eq!(engine.get(b"k").unwrap(), None);
}

#[test]
fn test_sqlite_missing_file_without_create() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("absent.db"))
        .create_if_missing(false)
        .build();

    let result = Store::open_with_config(config);

    assert!(matches!(result, Err(InfoDbError::Io(_))));
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_upsert_then_fetch_returns_record(
        key in "[a-zA-Z][a-zA-Z0-9 ]{0,15}",
        descriptions in prop::collection::vec("[a-z ]{0,20}", 1..6),
    ) {
        let (_engine, store) = setup_memory_store();
        let entries = descriptions
            .iter()
            .map(|d| entry("author", d))
            .collect::<Vec<_>>();
        let record = Record::with_entries(key.clone(), entries).unwrap();

        store.upsert(&record).unwrap();
        prop_assert_eq!(store.fetch(&key.to_uppercase()).unwrap(), Some(record));

        store.upsert(&Record::new(key.clone()).unwrap()).unwrap();
        prop_assert_eq!(store.fetch(&key).unwrap(), None);
    }
}
