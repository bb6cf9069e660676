//! Decoding remote collection snapshots into a [`Catalog`].
//!
//! Decoding is total: whatever the source delivers, a catalog comes out.
//! Entries that do not have the expected shape are left out and reported in
//! [`Decoded::dropped`] so the caller can log and count them.
//!
//! # Payload shape
//!
//! ```json
//! {
//!   "k1": {
//!     "title": "Dune",
//!     "author": "Frank Herbert",
//!     "genre": "Science Fiction",
//!     "pages": 412,
//!     "coverImage": "https://covers.example/dune.jpg",
//!     "description": "Spice and sand."
//!   }
//! }
//! ```
//!
//! The entry key becomes the book id. Entries come out in the order the
//! remote store uses for child keys: integer keys first in ascending numeric
//! order, then every other key in string order. An array payload is read as
//! a collection keyed by index, skipping `null` holes.

use crate::catalog::Catalog;
use bookshelf_core::book::{BookId, BookRecord};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Fields every remote entry must carry
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteEntry {
    title: String,
    author: String,
    genre: String,
    pages: u32,
    cover_image: String,
    description: String,
}

impl RemoteEntry {
    fn into_record(self, key: &str) -> BookRecord {
        BookRecord {
            id: BookId::new(key),
            title: self.title,
            author: self.author,
            genre: self.genre,
            pages: self.pages,
            cover_image: self.cover_image,
            description: self.description,
        }
    }
}

/// An entry left out of the catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedEntry {
    /// The entry key in the remote collection
    pub key: String,
    /// Why the entry could not be decoded
    pub reason: String,
}

/// Result of decoding one snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// The rebuilt catalog
    pub catalog: Catalog,
    /// Entries that were left out
    pub dropped: Vec<DroppedEntry>,
    /// Set when the payload itself was neither a collection nor empty
    pub unexpected_payload: Option<&'static str>,
}

/// Decodes a full collection snapshot
///
/// `None` and `null` both mean the collection is empty.
#[must_use]
pub fn decode_snapshot(payload: Option<&Value>) -> Decoded {
    match payload {
        None | Some(Value::Null) => Decoded::default(),
        Some(Value::Object(entries)) => {
            let mut keyed: Vec<_> = entries.iter().collect();
            keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b));
            decode_entries(keyed.into_iter().map(|(key, entry)| (key.clone(), entry)))
        },
        Some(Value::Array(entries)) => decode_entries(
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| !entry.is_null())
                .map(|(index, entry)| (index.to_string(), entry)),
        ),
        Some(other) => Decoded {
            unexpected_payload: Some(kind_of(other)),
            ..Decoded::default()
        },
    }
}

fn decode_entries<'a, I>(entries: I) -> Decoded
where
    I: Iterator<Item = (String, &'a Value)>,
{
    let mut books = Vec::new();
    let mut dropped = Vec::new();

    for (key, entry) in entries {
        match RemoteEntry::deserialize(entry) {
            Ok(remote) => books.push(remote.into_record(&key)),
            Err(error) => dropped.push(DroppedEntry {
                key,
                reason: error.to_string(),
            }),
        }
    }

    Decoded {
        catalog: Catalog::new(books),
        dropped,
        unexpected_payload: None,
    }
}

/// Integer keys sort numerically ahead of all other keys
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Parses keys written as canonical unsigned integers, so `"07"` stays a string key
fn integer_key(key: &str) -> Option<u32> {
    key.parse::<u32>()
        .ok()
        .filter(|value| value.to_string() == key)
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
