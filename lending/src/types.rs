//! Domain types for the lending state.
//!
//! The lending state is the ordered list of books currently held in this
//! session. Two invariants hold for every state a [`LendingStore`] commits:
//!
//! - at most [`BORROW_LIMIT`] books are borrowed;
//! - no two borrowed books share an id.
//!
//! [`LendingStore`]: crate::LendingStore

use bookshelf_core::book::{BookId, BookRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of books held at the same time
pub const BORROW_LIMIT: usize = 3;

/// Books currently borrowed, oldest first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingState {
    /// Borrowed books in borrow order
    pub borrowed: Vec<BookRecord>,
}

impl LendingState {
    /// Creates an empty lending state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            borrowed: Vec::new(),
        }
    }

    /// Borrowed books, oldest first
    #[must_use]
    pub fn borrowed(&self) -> &[BookRecord] {
        &self.borrowed
    }

    /// Returns the number of borrowed books
    #[must_use]
    pub fn count(&self) -> usize {
        self.borrowed.len()
    }

    /// Checks if nothing is borrowed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.borrowed.is_empty()
    }

    /// Checks if the book with `id` is borrowed
    #[must_use]
    pub fn is_borrowed(&self, id: &str) -> bool {
        self.borrowed.iter().any(|book| book.has_id(id))
    }

    /// Returns a borrowed book by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BookRecord> {
        self.borrowed.iter().find(|book| book.has_id(id))
    }

    /// Ids of the borrowed books, oldest first
    pub fn ids(&self) -> impl Iterator<Item = &BookId> {
        self.borrowed.iter().map(|book| &book.id)
    }

    /// How many more books can be borrowed
    #[must_use]
    pub fn remaining(&self) -> usize {
        BORROW_LIMIT.saturating_sub(self.count())
    }

    /// Checks if the borrow limit is reached
    #[must_use]
    pub fn is_at_limit(&self) -> bool {
        self.count() >= BORROW_LIMIT
    }
}

/// Intents the lending store accepts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LendingAction {
    /// Borrow a book
    Borrow(BookRecord),
    /// Return a book by id; returning a book that is not held is a no-op
    Return(BookId),
}

/// Why a borrow was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    /// The session already holds the maximum number of books
    #[error("cannot borrow more than {limit} books at a time")]
    LimitReached {
        /// The borrow limit in force
        limit: usize,
    },

    /// The book is already in the borrowed list
    #[error("book {id} is already borrowed")]
    AlreadyBorrowed {
        /// The duplicate id
        id: BookId,
    },
}
