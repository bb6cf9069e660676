//! # Bookshelf Testing
//!
//! Testing utilities and helpers for the Bookshelf components.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then reducer tests
//! - [`ScriptedCatalogSource`]: a hand-driven catalog transport
//! - [`RecordingListener`]: captures every notification a listener receives
//! - Fixtures for books and remote payloads
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use bookshelf_testing::{fixtures::book, RecordingListener};
//!
//! #[test]
//! fn test_borrow_notifies() {
//!     let store = LendingStore::new();
//!     let recorder = RecordingListener::new();
//!     let _subscription = store.subscribe(recorder.listener());
//!
//!     store.borrow(book("k1")).unwrap();
//!
//!     assert_eq!(recorder.len(), 1);
//! }
//! ```

pub mod scripted_source;

pub use reducer_test::{ReducerTest, assertions};
pub use scripted_source::ScriptedCatalogSource;

/// Test helpers and utilities
pub mod helpers {
    use std::sync::{Arc, Mutex, PoisonError};

    /// Captures clones of every value a listener is invoked with
    ///
    /// # Example
    ///
    /// ```
    /// use bookshelf_core::listener::ListenerSet;
    /// use bookshelf_testing::RecordingListener;
    ///
    /// let listeners = ListenerSet::<u32>::new();
    /// let recorder = RecordingListener::new();
    /// let _subscription = listeners.subscribe(recorder.listener());
    ///
    /// listeners.notify(&3);
    /// assert_eq!(recorder.calls(), vec![3]);
    /// ```
    #[derive(Debug)]
    pub struct RecordingListener<T> {
        calls: Arc<Mutex<Vec<T>>>,
    }

    impl<T: Clone + Send + 'static> RecordingListener<T> {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// A listener closure that records into this recorder
        pub fn listener(&self) -> impl FnMut(&T) + Send + use<T> {
            let calls = Arc::clone(&self.calls);
            move |value: &T| {
                calls
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(value.clone());
            }
        }

        /// Every recorded value, oldest first
        #[must_use]
        pub fn calls(&self) -> Vec<T> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// The most recent value
        #[must_use]
        pub fn last(&self) -> Option<T> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last()
                .cloned()
        }

        /// Number of recorded invocations
        #[must_use]
        pub fn len(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Check if the listener was never invoked
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl<T: Clone + Send + 'static> Default for RecordingListener<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T> Clone for RecordingListener<T> {
        fn clone(&self) -> Self {
            Self {
                calls: Arc::clone(&self.calls),
            }
        }
    }

    /// Install a test-friendly tracing subscriber (once per process)
    ///
    /// Honours `RUST_LOG`; output goes through the test harness capture.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Book and remote payload fixtures
pub mod fixtures {
    use bookshelf_core::book::BookRecord;
    use serde_json::{Map, Value, json};

    /// A fully populated book with the given id
    ///
    /// Display fields are derived from the id, so two calls with the same id
    /// produce equal records.
    #[must_use]
    pub fn book(id: &str) -> BookRecord {
        BookRecord::new(id, format!("Title {id}"))
            .with_author(format!("Author {id}"))
            .with_genre("Fiction")
            .with_pages(320)
            .with_cover_image(format!("https://covers.example/{id}.jpg"))
            .with_description(format!("Description of {id}"))
    }

    /// Books for each id, in order
    #[must_use]
    pub fn books(ids: &[&str]) -> Vec<BookRecord> {
        ids.iter().map(|id| book(id)).collect()
    }

    /// The remote JSON entry for `record` (without its key)
    #[must_use]
    pub fn remote_entry(record: &BookRecord) -> Value {
        json!({
            "title": record.title,
            "author": record.author,
            "genre": record.genre,
            "pages": record.pages,
            "coverImage": record.cover_image,
            "description": record.description,
        })
    }

    /// A remote collection snapshot keyed by book id
    #[must_use]
    pub fn remote_snapshot(records: &[BookRecord]) -> Value {
        let entries: Map<String, Value> = records
            .iter()
            .map(|record| (record.id.to_string(), remote_entry(record)))
            .collect();
        Value::Object(entries)
    }
}

/// Property-based testing utilities
pub mod properties {
    use bookshelf_core::book::{BookId, BookRecord};
    use proptest::prelude::*;

    /// Ids drawn from a small pool so collisions actually happen
    pub fn arb_book_id() -> impl Strategy<Value = BookId> {
        (0u8..6).prop_map(|n| BookId::new(format!("b{n}")))
    }

    /// Books whose display fields are arbitrary but whose id is pooled
    pub fn arb_book() -> impl Strategy<Value = BookRecord> {
        (arb_book_id(), "[A-Za-z ]{1,24}", 0u32..2_000).prop_map(|(id, title, pages)| {
            BookRecord::new(id, title)
                .with_author("Anonymous")
                .with_genre("Fiction")
                .with_pages(pages)
        })
    }
}

// Re-export commonly used items
pub use helpers::{RecordingListener, init_test_tracing};
