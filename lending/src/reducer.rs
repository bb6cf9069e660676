//! Reducer logic for the lending state.
//!
//! One validating transition function handles both intents: a borrow is
//! checked against the current state before anything is appended, a return
//! removes the matching book if there is one.

use crate::types::{BORROW_LIMIT, LendingAction, LendingError, LendingState};
use bookshelf_core::book::BookRecord;
use bookshelf_core::reducer::{Reducer, Transition};

/// Environment for the lending reducer
#[derive(Clone, Copy, Debug)]
pub struct LendingEnvironment {
    borrow_limit: usize,
}

impl LendingEnvironment {
    /// Creates the environment with the fixed borrow limit
    #[must_use]
    pub const fn new() -> Self {
        Self {
            borrow_limit: BORROW_LIMIT,
        }
    }

    /// The borrow limit in force
    #[must_use]
    pub const fn borrow_limit(&self) -> usize {
        self.borrow_limit
    }
}

impl Default for LendingEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Reducer for the lending state
#[derive(Clone, Copy, Debug, Default)]
pub struct LendingReducer;

impl LendingReducer {
    /// Creates a new `LendingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a borrow against `state`
    ///
    /// The limit is checked before the duplicate.
    ///
    /// # Errors
    ///
    /// - [`LendingError::LimitReached`] if the limit is already reached
    /// - [`LendingError::AlreadyBorrowed`] if `book` is already held
    pub fn validate_borrow(
        state: &LendingState,
        book: &BookRecord,
        env: &LendingEnvironment,
    ) -> Result<(), LendingError> {
        if state.count() >= env.borrow_limit() {
            return Err(LendingError::LimitReached {
                limit: env.borrow_limit(),
            });
        }

        if state.is_borrowed(book.id.as_str()) {
            return Err(LendingError::AlreadyBorrowed {
                id: book.id.clone(),
            });
        }

        Ok(())
    }
}

impl Reducer for LendingReducer {
    type State = LendingState;
    type Action = LendingAction;
    type Environment = LendingEnvironment;
    type Error = LendingError;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Transition, LendingError> {
        match action {
            LendingAction::Borrow(book) => {
                Self::validate_borrow(state, &book, env)?;

                tracing::debug!(book_id = %book.id, title = %book.title, "Book borrowed");
                state.borrowed.push(book);
                Ok(Transition::Changed)
            }

            LendingAction::Return(id) => {
                let before = state.count();
                state.borrowed.retain(|book| book.id != id);

                if state.count() < before {
                    tracing::debug!(book_id = %id, "Book returned");
                    Ok(Transition::Changed)
                } else {
                    tracing::trace!(book_id = %id, "Return ignored, book not borrowed");
                    Ok(Transition::Unchanged)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_core::book::BookId;
    use bookshelf_testing::fixtures::{book, books};
    use bookshelf_testing::{ReducerTest, assertions};

    fn state_with(ids: &[&str]) -> LendingState {
        LendingState {
            borrowed: books(ids),
        }
    }

    #[test]
    fn test_borrow_success() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(LendingState::new())
            .when_action(LendingAction::Borrow(book("k1")))
            .then_state(|state| {
                assert_eq!(state.count(), 1);
                assert!(state.is_borrowed("k1"));
            })
            .then_outcome(assertions::assert_changed)
            .run();
    }

    #[test]
    fn test_borrow_appends_in_order() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(state_with(&["k1", "k2"]))
            .when_action(LendingAction::Borrow(book("k3")))
            .then_state(|state| {
                assert_eq!(*state, state_with(&["k1", "k2", "k3"]));
            })
            .run();
    }

    #[test]
    fn test_borrow_over_limit() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(state_with(&["k1", "k2", "k3"]))
            .when_action(LendingAction::Borrow(book("k4")))
            .then_state(|state| {
                assert_eq!(*state, state_with(&["k1", "k2", "k3"]));
            })
            .then_outcome(|outcome| {
                assertions::assert_rejected_with(outcome, &LendingError::LimitReached { limit: 3 });
            })
            .run();
    }

    #[test]
    fn test_borrow_duplicate() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(state_with(&["k1"]))
            .when_action(LendingAction::Borrow(book("k1")))
            .then_state(|state| {
                assert_eq!(state.count(), 1);
            })
            .then_outcome(|outcome| {
                assertions::assert_rejected_with(
                    outcome,
                    &LendingError::AlreadyBorrowed { id: BookId::new("k1") },
                );
            })
            .run();
    }

    #[test]
    fn test_limit_checked_before_duplicate() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(state_with(&["k1", "k2", "k3"]))
            .when_action(LendingAction::Borrow(book("k1")))
            .then_outcome(|outcome| {
                assertions::assert_rejected_with(outcome, &LendingError::LimitReached { limit: 3 });
            })
            .run();
    }

    #[test]
    fn test_return_removes_book() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(state_with(&["k1", "k2", "k3"]))
            .when_action(LendingAction::Return(BookId::new("k2")))
            .then_state(|state| {
                assert_eq!(*state, state_with(&["k1", "k3"]));
            })
            .then_outcome(assertions::assert_changed)
            .run();
    }

    #[test]
    fn test_return_unknown_is_noop() {
        ReducerTest::new(LendingReducer::new())
            .with_env(LendingEnvironment::new())
            .given_state(state_with(&["k1"]))
            .when_action(LendingAction::Return(BookId::new("missing")))
            .then_state(|state| {
                assert_eq!(*state, state_with(&["k1"]));
            })
            .then_outcome(assertions::assert_unchanged)
            .run();
    }

    #[test]
    fn test_validate_borrow_does_not_mutate() {
        let state = state_with(&["k1"]);
        let env = LendingEnvironment::new();

        assert!(LendingReducer::validate_borrow(&state, &book("k2"), &env).is_ok());
        assert!(LendingReducer::validate_borrow(&state, &book("k1"), &env).is_err());
        assert_eq!(state.count(), 1);
    }
}
