//! # infodb
//!
//! An embedded record store for user-contributed "info" entries:
//! - Case-insensitive keys mapped to ordered lists of authored, timestamped entries
//! - Stable slot ids with a persistent LIFO free list for space reuse
//! - Uniform random sampling of live records
//! - A reentrant lock making every operation atomic across threads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store                                │
//! │     fetch / upsert / append / fetch_random / remove         │
//! │                  (ReentrantMutex)                           │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!                ▼                               ▼
//!        ┌───────────────┐               ┌───────────────┐
//!        │ SlotAllocator │               │     Codec     │
//!        │ (free list)   │               │ (record blob) │
//!        └───────┬───────┘               └───────────────┘
//!                │
//!                ▼
//!        ┌───────────────────────────────────────┐
//!        │              KvEngine                 │
//!        │   get / put / delete / sync on bytes  │
//!        └───────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod timestamp;
pub mod record;
pub mod codec;
pub mod engine;
pub mod allocator;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{InfoDbError, MalformedRecord, Result};
pub use config::Config;
pub use engine::{KvEngine, MemoryEngine, SqliteEngine};
pub use record::{Entry, Record};
pub use store::{Store, StoreStats};
pub use timestamp::Timestamp;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of infodb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
