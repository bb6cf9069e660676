//! Property and scheduling tests for the synchronous Store.

#![allow(clippy::unwrap_used)]

use bookshelf_core::reducer::{Reducer, Transition};
use bookshelf_runtime::{Store, StoreConfig};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_pending, assert_ready, task};

#[derive(Debug, Clone, Default, PartialEq)]
struct Bag {
    items: Vec<u8>,
}

#[derive(Debug, Clone)]
enum BagAction {
    Put(u8),
    Take(u8),
}

struct BagReducer;

impl Reducer for BagReducer {
    type State = Bag;
    type Action = BagAction;
    type Environment = usize;
    type Error = String;

    fn reduce(
        &self,
        state: &mut Bag,
        action: BagAction,
        capacity: &usize,
    ) -> Result<Transition, String> {
        match action {
            BagAction::Put(_) if state.items.len() >= *capacity => Err("full".to_string()),
            BagAction::Put(item) => {
                state.items.push(item);
                Ok(Transition::Changed)
            },
            BagAction::Take(item) => match state.items.iter().position(|i| *i == item) {
                Some(index) => {
                    state.items.remove(index);
                    Ok(Transition::Changed)
                },
                None => Ok(Transition::Unchanged),
            },
        }
    }
}

fn arb_action() -> impl Strategy<Value = BagAction> {
    prop_oneof![
        (0u8..4).prop_map(BagAction::Put),
        (0u8..4).prop_map(BagAction::Take),
    ]
}

proptest! {
    /// Listeners see exactly one state per change, and the last one is current
    #[test]
    fn listeners_mirror_changed_states(actions in prop::collection::vec(arb_action(), 0..40)) {
        let store = Store::new(Bag::default(), BagReducer, 3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(move |bag: &Bag| sink.lock().unwrap().push(bag.clone()));

        let mut changes = 0;
        for action in actions {
            let before = store.snapshot();
            match store.send(action) {
                Ok(after) if after != before => changes += 1,
                Ok(after) => prop_assert_eq!(after, before),
                Err(_) => prop_assert_eq!(store.snapshot(), before),
            }
            prop_assert!(store.state(|bag| bag.items.len()) <= 3);
        }

        let seen = seen.lock().unwrap();
        prop_assert_eq!(seen.len(), changes);
        if let Some(last) = seen.last() {
            prop_assert_eq!(last, &store.snapshot());
        }
    }
}

#[test]
fn watch_is_only_woken_by_changes() {
    let store = Store::with_config(Bag::default(), BagReducer, 1, StoreConfig::new("bag"));
    let mut rx = store.watch();

    {
        let mut changed = task::spawn(rx.changed());
        assert_pending!(changed.poll());

        store.send(BagAction::Take(9)).unwrap();
        assert!(!changed.is_woken());

        store.send(BagAction::Put(1)).unwrap();
        assert!(changed.is_woken());
        assert_ready!(changed.poll()).unwrap();
    }

    assert_eq!(rx.borrow_and_update().items, vec![1]);

    let mut changed = task::spawn(rx.changed());
    assert!(store.send(BagAction::Put(2)).is_err());
    assert_pending!(changed.poll());
}

#[test]
fn dispatch_is_traced_under_store_name() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bookshelf_runtime=trace")
        .with_test_writer()
        .try_init();

    let store = Store::with_config(Bag::default(), BagReducer, 1, StoreConfig::new("traced"));

    assert!(store.send(BagAction::Put(1)).is_ok());
    assert!(store.send(BagAction::Put(2)).is_err());
    assert_eq!(store.config().name, "traced");
}
