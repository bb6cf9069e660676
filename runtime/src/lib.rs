//! # Bookshelf Runtime
//!
//! Runtime implementation for the Bookshelf reducers.
//!
//! This crate provides the [`Store`] that owns a piece of state, serializes
//! every action through a reducer, and notifies subscribers with the committed
//! state.
//!
//! ## Core Components
//!
//! - **Store**: owns state and coordinates reducer execution
//! - **Listeners**: synchronous callbacks invoked after each state change
//! - **Watch channel**: the same committed states for async consumers
//!
//! ## Example
//!
//! ```ignore
//! use bookshelf_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Dispatch an action; the reducer's validation error comes straight back
//! let state = store.send(Action::DoSomething)?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field);
//! ```

use bookshelf_core::reducer::Reducer;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Prometheus metrics for observability
pub mod metrics;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use bookshelf_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::new("lending")
///     .with_slow_notify_threshold(Duration::from_millis(10));
/// assert_eq!(config.name, "lending");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name used in tracing spans and metric labels
    pub name: String,
    /// Notification rounds taking longer than this are logged as warnings
    pub slow_notify_threshold: Duration,
}

impl StoreConfig {
    /// Create a configuration with the given store name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the store name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the slow notification threshold
    #[must_use]
    pub const fn with_slow_notify_threshold(mut self, threshold: Duration) -> Self {
        self.slow_notify_threshold = threshold;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            slow_notify_threshold: Duration::from_millis(50),
        }
    }
}

/// Store module - the runtime coordinator for a reducer
pub mod store {
    use super::{Arc, Mutex, PoisonError, Reducer, RwLock, StoreConfig};
    use crate::metrics::{
        STORE_COMMANDS_REJECTED_TOTAL, STORE_COMMANDS_TOTAL, STORE_NOTIFICATIONS_TOTAL,
        STORE_REDUCER_DURATION_SECONDS,
    };
    use bookshelf_core::listener::{ListenerSet, Subscription};
    use std::fmt;
    use std::time::Instant;
    use tokio::sync::watch;

    struct StoreInner<S, E, R> {
        config: StoreConfig,
        /// Held for the whole validate → mutate → notify sequence
        dispatch: Mutex<()>,
        state: RwLock<S>,
        reducer: R,
        environment: E,
        listeners: ListenerSet<S>,
        watch: watch::Sender<S>,
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` so reads never see a half-applied action)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Subscribers (notified after every state change)
    ///
    /// Actions are processed one at a time in call order: validation, mutation
    /// and notification of one action complete before the next one starts.
    /// Cloning a `Store` yields another handle to the same state.
    ///
    /// Listeners run while the store is dispatching, so a listener must not
    /// call [`send`](Self::send) on the same store.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        inner: Arc<StoreInner<S, E, R>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
        R::Error: fmt::Display,
        S: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
            let (watch, _) = watch::channel(initial_state.clone());

            Self {
                inner: Arc::new(StoreInner {
                    config,
                    dispatch: Mutex::new(()),
                    state: RwLock::new(initial_state),
                    reducer,
                    environment,
                    listeners: ListenerSet::new(),
                    watch,
                }),
            }
        }

        /// Send an action to the store
        ///
        /// The action is validated and applied by the reducer against the
        /// current state. On success the committed state is returned; if the
        /// reducer reported a change, every subscriber is notified with it
        /// before this method returns.
        ///
        /// # Errors
        ///
        /// Returns the reducer's validation error. Nothing changed and nobody
        /// was notified.
        #[tracing::instrument(skip(self, action), fields(store = %self.inner.config.name), name = "store_send")]
        pub fn send(&self, action: A) -> Result<S, R::Error> {
            let _dispatch = self
                .inner
                .dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            tracing::trace!("Acquired dispatch lock");

            let name = self.inner.config.name.clone();
            metrics::counter!(STORE_COMMANDS_TOTAL, "store" => name.clone()).increment(1);

            let (transition, snapshot) = {
                let mut state = self
                    .inner
                    .state
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);

                let start = Instant::now();
                let outcome = self
                    .inner
                    .reducer
                    .reduce(&mut state, action, &self.inner.environment);
                metrics::histogram!(STORE_REDUCER_DURATION_SECONDS, "store" => name.clone())
                    .record(start.elapsed().as_secs_f64());

                match outcome {
                    Ok(transition) => (transition, state.clone()),
                    Err(error) => {
                        tracing::warn!(%error, "Command rejected");
                        metrics::counter!(STORE_COMMANDS_REJECTED_TOTAL, "store" => name)
                            .increment(1);
                        return Err(error);
                    }
                }
            };

            if transition.is_changed() {
                self.inner.watch.send_replace(snapshot.clone());

                let start = Instant::now();
                let delivered = self.inner.listeners.notify(&snapshot);
                let elapsed = start.elapsed();

                metrics::counter!(STORE_NOTIFICATIONS_TOTAL, "store" => name)
                    .increment(delivered as u64);
                if elapsed > self.inner.config.slow_notify_threshold {
                    tracing::warn!(
                        delivered,
                        elapsed_ms = elapsed.as_millis(),
                        "Slow listeners delayed the store"
                    );
                }
                tracing::debug!(delivered, "State changed, listeners notified");
            } else {
                tracing::debug!("Command accepted, state unchanged");
            }

            Ok(snapshot)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.borrowed.len());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self
                .inner
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            f(&*state)
        }

        /// Clone of the current state
        #[must_use]
        pub fn snapshot(&self) -> S {
            self.state(S::clone)
        }

        /// Register a listener invoked with the full state after every change
        ///
        /// The listener is not called with the current state on registration.
        pub fn subscribe<F>(&self, listener: F) -> Subscription
        where
            F: FnMut(&S) + Send + 'static,
        {
            self.inner.listeners.subscribe(listener)
        }

        /// Watch committed states from async code
        ///
        /// The receiver starts at the current state and is marked changed
        /// whenever a listener round runs.
        #[must_use]
        pub fn watch(&self) -> watch::Receiver<S> {
            self.inner.watch.subscribe()
        }

        /// Number of registered listeners
        #[must_use]
        pub fn listener_count(&self) -> usize {
            self.inner.listeners.len()
        }

        /// The store's configuration
        #[must_use]
        pub fn config(&self) -> &StoreConfig {
            &self.inner.config
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<S, A, E, R> fmt::Debug for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
        S: fmt::Debug + 'static,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let state = self
                .inner
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            f.debug_struct("Store")
                .field("name", &self.inner.config.name)
                .field("state", &*state)
                .field("listeners", &self.inner.listeners.len())
                .finish_non_exhaustive()
        }
    }
}

pub use store::Store;
