//! Record types
//!
//! A [`Record`] is a key plus an ordered list of [`Entry`] values. Keys are
//! matched case-insensitively but stored with their original case.
//!
//! Text fields never contain NUL: the on-disk format uses NUL as the field
//! terminator, so constructors reject it up front.

use std::fmt;

use serde::Serialize;

use crate::error::{InfoDbError, Result};
use crate::timestamp::Timestamp;

/// Author recorded when the caller has no name to offer
pub const ANONYMOUS_AUTHOR: &str = "<anonymous>";

/// One timestamped, authored contribution to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    author: String,
    description: String,
    timestamp: Timestamp,
}

impl Entry {
    /// Create an entry stamped with the current time (whole seconds)
    pub fn new(author: impl Into<String>, description: impl Into<String>) -> Result<Self> {
        Self::with_timestamp(author, description, Timestamp::now())
    }

    /// Create an entry with an explicit timestamp. A `DateTime<Utc>` is
    /// accepted too and truncated to whole seconds.
    pub fn with_timestamp(
        author: impl Into<String>,
        description: impl Into<String>,
        timestamp: impl Into<Timestamp>,
    ) -> Result<Self> {
        let author = author.into();
        let description = description.into();
        check_text("author", &author)?;
        check_text("description", &description)?;

        Ok(Self {
            author,
            description,
            timestamp: timestamp.into(),
        })
    }

    /// Build an entry from already-validated parts (decoder only)
    pub(crate) fn from_parts(author: String, description: String, timestamp: Timestamp) -> Self {
        Self {
            author,
            description,
            timestamp,
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A key and its entries, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    key: String,
    entries: Vec<Entry>,
}

impl Record {
    /// Create a record with no entries
    pub fn new(key: impl Into<String>) -> Result<Self> {
        Self::with_entries(key, Vec::new())
    }

    /// Create a record holding `entries`
    pub fn with_entries(key: impl Into<String>, entries: Vec<Entry>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(InfoDbError::InvalidInput("key is empty".to_string()));
        }
        check_text("key", &key)?;
        Ok(Self { key, entries })
    }

    /// Build a record from already-validated parts (decoder only)
    pub(crate) fn from_parts(key: String, entries: Vec<Entry>) -> Self {
        Self { key, entries }
    }

    /// The key as originally written
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The lookup form of the key
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.key)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append an entry after the existing ones
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Drop every entry whose description equals `description`.
    /// Author and timestamp do not take part in the comparison.
    ///
    /// Returns the number of entries removed.
    pub fn remove_description(&mut self, description: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.description != description);
        before - self.entries.len()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl fmt::Display for Record {
    /// `key = desc [author, dd.mm.yyyy] | desc [author, dd.mm.yyyy]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.key)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            let date = entry.timestamp.civil();
            write!(
                f,
                "{} [{}, {:02}.{:02}.{:04}]",
                entry.description, entry.author, date.day, date.month, date.year
            )?;
        }
        Ok(())
    }
}

/// Lowercase a key for lookup
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

/// Trim `text` and collapse every whitespace run to a single space.
///
/// Returns `None` when nothing but whitespace was given.
pub fn fold_whitespace(text: &str) -> Option<String> {
    let folded = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if folded.is_empty() {
        None
    } else {
        Some(folded)
    }
}

fn check_text(field: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(InfoDbError::InvalidInput(format!(
            "{} contains a NUL byte",
            field
        )));
    }
    Ok(())
}
