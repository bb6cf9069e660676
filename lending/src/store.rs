//! The lending store: the single owner of the borrowed list.

use crate::reducer::{LendingEnvironment, LendingReducer};
use crate::types::{LendingAction, LendingError, LendingState};
use bookshelf_core::book::{BookId, BookRecord};
use bookshelf_core::listener::Subscription;
use bookshelf_runtime::{Store, StoreConfig};
use tokio::sync::watch;

type Inner = Store<LendingState, LendingAction, LendingEnvironment, LendingReducer>;

/// Holds the books borrowed in this session
///
/// Every mutation goes through [`LendingReducer`], so the borrow limit and
/// the no-duplicate rule hold for every state a subscriber ever sees.
/// Cloning returns another handle to the same state.
///
/// # Example
///
/// ```
/// use bookshelf_core::BookRecord;
/// use bookshelf_lending::{LendingError, LendingStore};
///
/// let store = LendingStore::new();
/// for id in ["b1", "b2", "b3"] {
///     store.borrow(BookRecord::new(id, id)).unwrap();
/// }
///
/// let refused = store.borrow(BookRecord::new("b4", "b4"));
/// assert_eq!(refused, Err(LendingError::LimitReached { limit: 3 }));
///
/// let state = store.return_book("b2");
/// assert_eq!(state.count(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct LendingStore {
    inner: Inner,
}

impl LendingStore {
    /// Creates an empty store named `lending`
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::new("lending"))
    }

    /// Creates an empty store with custom configuration
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Store::with_config(
                LendingState::new(),
                LendingReducer::new(),
                LendingEnvironment::new(),
                config,
            ),
        }
    }

    /// Borrows `book`
    ///
    /// On success the book is appended, every subscriber is notified once
    /// with the new state, and that state is returned.
    ///
    /// # Errors
    ///
    /// - [`LendingError::LimitReached`] when three books are already borrowed
    /// - [`LendingError::AlreadyBorrowed`] when `book` is already borrowed
    ///
    /// Nothing changes and nobody is notified on error.
    pub fn borrow(&self, book: BookRecord) -> Result<LendingState, LendingError> {
        self.inner.send(LendingAction::Borrow(book))
    }

    /// Returns the book with `id`
    ///
    /// Returning a book that is not borrowed is a no-op: the unchanged state
    /// comes back and subscribers are not notified.
    pub fn return_book(&self, id: impl Into<BookId>) -> LendingState {
        self.inner
            .send(LendingAction::Return(id.into()))
            .unwrap_or_else(|error| {
                tracing::error!(%error, "Return was rejected");
                self.inner.snapshot()
            })
    }

    /// Applies a raw lending action
    ///
    /// # Errors
    ///
    /// Same as [`borrow`](Self::borrow) for [`LendingAction::Borrow`]; a
    /// return never fails.
    pub fn dispatch(&self, action: LendingAction) -> Result<LendingState, LendingError> {
        self.inner.send(action)
    }

    /// Checks whether `book` could be borrowed right now, without borrowing it
    ///
    /// # Errors
    ///
    /// The error [`borrow`](Self::borrow) would return.
    pub fn check_borrow(&self, book: &BookRecord) -> Result<(), LendingError> {
        self.inner
            .state(|state| LendingReducer::validate_borrow(state, book, &LendingEnvironment::new()))
    }

    /// Current lending state
    #[must_use]
    pub fn state(&self) -> LendingState {
        self.inner.snapshot()
    }

    /// Reads the current state without cloning it
    pub fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&LendingState) -> T,
    {
        self.inner.state(f)
    }

    /// Registers a listener called with the full state after every change
    ///
    /// The listener runs on the thread that made the change and must not
    /// borrow or return through this store from inside the callback.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&LendingState) + Send + 'static,
    {
        self.inner.subscribe(listener)
    }

    /// Watches committed states from async code
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<LendingState> {
        self.inner.watch()
    }
}

impl Default for LendingStore {
    fn default() -> Self {
        Self::new()
    }
}
