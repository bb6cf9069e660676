//! # Bookshelf Lending
//!
//! The lending state manager: tracks which books this session has borrowed
//! and enforces the borrowing rules.
//!
//! - at most [`BORROW_LIMIT`] books are held at once
//! - a book can be held only once
//!
//! [`LendingStore`] is the only way to change the borrowed list. It is an
//! explicitly owned value; clone it to hand the same store to another part of
//! the application.
//!
//! ## Example
//!
//! ```
//! use bookshelf_core::BookRecord;
//! use bookshelf_lending::LendingStore;
//!
//! let store = LendingStore::new();
//! let _subscription = store.subscribe(|state| {
//!     println!("{} of 3 borrowed", state.count());
//! });
//!
//! store.borrow(BookRecord::new("k1", "Dune")).unwrap();
//! assert!(store.state().is_borrowed("k1"));
//! ```

pub mod reducer;
pub mod store;
pub mod types;

pub use reducer::{LendingEnvironment, LendingReducer};
pub use store::LendingStore;
pub use types::{BORROW_LIMIT, LendingAction, LendingError, LendingState};
