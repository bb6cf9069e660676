//! # Bookshelf Core
//!
//! Core traits and types shared by the Bookshelf components.
//!
//! This crate provides the fundamental abstractions for the lending store and
//! the catalog feed:
//!
//! - **Book**: [`BookRecord`] values identified by [`BookId`]
//! - **Reducer**: the single validating transition function
//!   `(State, Action, Environment) → Result<Transition, Error>`
//! - **Listeners**: [`ListenerSet`] and disposable [`Subscription`] handles
//! - **Source**: the push-based [`CatalogSource`] the catalog feed consumes
//!
//! ## Architecture Principles
//!
//! - Single writer: state changes only through a reducer
//! - Explicit ownership: stores are injected, never global
//! - Subscriptions are first-class disposable resources
//!
//! ## Example
//!
//! ```
//! use bookshelf_core::reducer::{Reducer, Transition};
//!
//! #[derive(Default)]
//! struct Shelf {
//!     titles: Vec<String>,
//! }
//!
//! enum ShelfAction {
//!     Add(String),
//! }
//!
//! struct ShelfReducer;
//!
//! impl Reducer for ShelfReducer {
//!     type State = Shelf;
//!     type Action = ShelfAction;
//!     type Environment = ();
//!     type Error = String;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Shelf,
//!         action: ShelfAction,
//!         _env: &(),
//!     ) -> Result<Transition, String> {
//!         match action {
//!             ShelfAction::Add(title) if title.is_empty() => Err("empty title".into()),
//!             ShelfAction::Add(title) => {
//!                 state.titles.push(title);
//!                 Ok(Transition::Changed)
//!             }
//!         }
//!     }
//! }
//!
//! let mut shelf = Shelf::default();
//! let outcome = ShelfReducer.reduce(&mut shelf, ShelfAction::Add("Dune".into()), &());
//! assert_eq!(outcome, Ok(Transition::Changed));
//! ```

pub mod book;
pub mod listener;
pub mod source;

/// Reducer module - The core trait for business logic
///
/// Reducers are synchronous, deterministic transition functions. They validate
/// an action against the current state, mutate the state in place on success,
/// and report whether anything changed. A rejected action must leave the state
/// untouched.
pub mod reducer {
    /// Outcome of a successful reduction
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Transition {
        /// State was mutated; subscribers must be notified
        Changed,
        /// Action accepted but state is identical; nobody is notified
        Unchanged,
    }

    impl Transition {
        /// Check if state was mutated
        #[must_use]
        pub const fn is_changed(self) -> bool {
            matches!(self, Self::Changed)
        }
    }

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Error`: Validation failure returned to the caller
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The validation error type
        type Error;

        /// Reduce an action into a state change
        ///
        /// 1. Validates the action against `state`
        /// 2. Updates state in place
        /// 3. Reports whether state changed
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when validation fails. The state must be left
        /// exactly as it was.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Transition, Self::Error>;
    }
}

pub use book::{BookId, BookRecord};
pub use listener::{ListenerSet, Subscription};
pub use reducer::{Reducer, Transition};
pub use source::{CatalogSource, EventHandler, FeedError, SourceEvent};
