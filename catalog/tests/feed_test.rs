//! Integration tests for the catalog feed.
//!
//! The feed is driven through `ScriptedCatalogSource`, which keeps handlers
//! alive after unsubscribe so late notifications can be simulated.
//!
//! Run with: `cargo test -p bookshelf-catalog --test feed_test`

#![allow(clippy::unwrap_used)]

use bookshelf_catalog::{
    BroadcastCatalogSource, Catalog, CatalogFeed, CatalogSink, FeedConfig, FeedPhase,
    InMemoryCatalogSource, decode_snapshot, open,
};
use bookshelf_core::source::FeedError;
use bookshelf_testing::fixtures::{book, books, remote_entry, remote_snapshot};
use bookshelf_testing::properties::arb_book;
use bookshelf_testing::{RecordingListener, ScriptedCatalogSource, init_test_tracing};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use tokio_test::{assert_pending, assert_ready, task};

#[derive(Default)]
struct RecordingSink {
    catalogs: Mutex<Vec<Catalog>>,
    errors: Mutex<Vec<FeedError>>,
}

impl RecordingSink {
    fn catalogs(&self) -> Vec<Catalog> {
        self.catalogs.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<FeedError> {
        self.errors.lock().unwrap().clone()
    }
}

impl CatalogSink for RecordingSink {
    fn catalog_changed(&self, catalog: &Catalog) {
        self.catalogs.lock().unwrap().push(catalog.clone());
    }

    fn feed_failed(&self, error: &FeedError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

fn ids(catalog: &Catalog) -> Vec<&str> {
    catalog.iter().map(|book| book.id.as_str()).collect()
}

#[test]
fn test_snapshot_becomes_catalog() {
    init_test_tracing();
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.emit_snapshot(remote_snapshot(&books(&["k1", "k2"])));

    let catalogs = sink.catalogs();
    assert_eq!(catalogs.len(), 1);
    assert_eq!(ids(&catalogs[0]), vec!["k1", "k2"]);
    assert_eq!(catalogs[0].get("k1"), Some(&book("k1")));
    assert_eq!(handle.catalog(), catalogs[0]);
    assert_eq!(source.subscribed_paths(), vec!["books".to_string()]);
}

#[test]
fn test_empty_object_flips_loading() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();
    assert!(handle.is_loading());

    source.emit_snapshot(json!({}));

    assert!(!handle.is_loading());
    assert_eq!(sink.catalogs(), vec![Catalog::empty()]);
}

#[test]
fn test_absent_payload_flips_loading() {
    let source = ScriptedCatalogSource::new().with_initial_snapshot(None);
    let sink = Arc::new(RecordingSink::default());

    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    assert!(!handle.is_loading());
    assert_eq!(sink.catalogs(), vec![Catalog::empty()]);
}

#[test]
fn test_every_change_rebuilds_whole_catalog() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let _handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.emit_snapshot(remote_snapshot(&books(&["k1", "k2"])));
    source.emit_snapshot(remote_snapshot(&books(&["k2", "k3"])));

    let catalogs = sink.catalogs();
    assert_eq!(ids(&catalogs[1]), vec!["k2", "k3"]);
}

#[test]
fn test_malformed_entry_dropped_siblings_kept() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let _handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    let mut broken = remote_entry(&book("k2"));
    broken["pages"] = json!(-3);
    source.emit_snapshot(json!({
        "k1": remote_entry(&book("k1")),
        "k2": broken,
        "k3": remote_entry(&book("k3")),
    }));

    assert_eq!(ids(&sink.catalogs()[0]), vec!["k1", "k3"]);
    assert!(sink.errors().is_empty());
}

#[test]
fn test_error_keeps_last_catalog() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.emit_snapshot(remote_snapshot(&books(&["k1"])));
    source.emit_error(FeedError::Transport("connection reset".into()));

    assert_eq!(sink.catalogs().len(), 1);
    assert_eq!(sink.errors(), vec![FeedError::Transport("connection reset".into())]);
    assert_eq!(ids(&handle.catalog()), vec!["k1"]);
    assert!(!handle.is_stopped());
}

#[test]
fn test_error_before_first_snapshot_keeps_loading() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.emit_error(FeedError::Transport("offline".into()));

    assert!(handle.is_loading());
    assert!(handle.catalog().is_empty());
}

#[test]
fn test_late_notification_after_stop_is_ignored() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.emit_snapshot(remote_snapshot(&books(&["k1"])));
    handle.stop();
    source.emit_snapshot(remote_snapshot(&books(&["k1", "k2"])));
    source.emit_error(FeedError::Transport("late".into()));

    assert_eq!(sink.catalogs().len(), 1);
    assert!(sink.errors().is_empty());
    assert_eq!(source.unsubscribe_count(), 1);
}

#[test]
fn test_stop_is_idempotent() {
    let source = ScriptedCatalogSource::new();
    let handle = open(&source, &FeedConfig::default(), RecordingSink::default()).unwrap();

    handle.stop();
    handle.stop();
    drop(handle);

    assert_eq!(source.unsubscribe_count(), 1);
}

#[test]
fn test_drop_stops_feed() {
    let source = ScriptedCatalogSource::new();
    let sink = Arc::new(RecordingSink::default());

    {
        let _handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();
    }
    source.emit_absent();

    assert!(sink.catalogs().is_empty());
    assert_eq!(source.unsubscribe_count(), 1);
}

#[test]
fn test_stopped_before_load_is_not_loading() {
    let source = ScriptedCatalogSource::new();
    let handle = open(&source, &FeedConfig::default(), RecordingSink::default()).unwrap();

    handle.stop();

    assert_eq!(handle.phase(), FeedPhase::Stopped);
    assert!(!handle.is_loading());
}

#[test]
fn test_refused_subscription() {
    let source = ScriptedCatalogSource::new();
    source.refuse_with("permission denied");

    let result = open(&source, &FeedConfig::new("books"), RecordingSink::default());

    assert_eq!(
        result.unwrap_err(),
        FeedError::Subscription {
            path: "books".into(),
            reason: "permission denied".into(),
        }
    );
}

#[test]
fn test_wait_until_loaded() {
    let source = ScriptedCatalogSource::new();
    let handle = open(&source, &FeedConfig::default(), RecordingSink::default()).unwrap();

    let mut loaded = task::spawn(handle.wait_until_loaded());
    assert_pending!(loaded.poll());

    source.emit_absent();

    assert!(loaded.is_woken());
    assert!(assert_ready!(loaded.poll()));
}

#[test]
fn test_wait_until_loaded_after_stop() {
    let source = ScriptedCatalogSource::new();
    let handle = open(&source, &FeedConfig::default(), RecordingSink::default()).unwrap();

    handle.stop();

    let mut loaded = task::spawn(handle.wait_until_loaded());
    assert!(!assert_ready!(loaded.poll()));
}

#[test]
fn test_facade_fans_out_to_listeners() {
    let source = ScriptedCatalogSource::new();
    let feed = CatalogFeed::new(source.clone(), FeedConfig::default());
    let catalogs = RecordingListener::new();
    let errors = RecordingListener::new();
    let _on_change = feed.on_catalog_change(catalogs.listener());
    let _on_error = feed.on_error(errors.listener());

    let handle = feed.start().unwrap();
    assert!(feed.is_loading());

    source.emit_snapshot(remote_snapshot(&books(&["k1"])));
    source.emit_error(FeedError::Lagged(4));

    assert!(!feed.is_loading());
    assert_eq!(catalogs.len(), 1);
    assert_eq!(errors.calls(), vec![FeedError::Lagged(4)]);

    handle.stop();
    source.emit_absent();
    assert_eq!(catalogs.len(), 1);
}

#[test]
fn test_facade_tracks_latest_start() {
    let source = ScriptedCatalogSource::new();
    let feed = CatalogFeed::new(source.clone(), FeedConfig::default());

    let first = feed.start().unwrap();
    source.emit_absent();
    assert!(!feed.is_loading());

    first.stop();
    let _second = feed.start().unwrap();
    assert!(feed.is_loading());
}

#[test]
fn test_in_memory_source_end_to_end() {
    let source = InMemoryCatalogSource::new();
    source.set_collection("books", remote_snapshot(&books(&["k1"])));
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.put_entry("books", "k2", remote_entry(&book("k2")));
    source.remove_entry("books", "k1");
    source.report_error("books", &FeedError::Transport("flaky".into()));

    let catalogs = sink.catalogs();
    assert_eq!(
        catalogs.iter().map(ids).collect::<Vec<_>>(),
        vec![vec!["k1"], vec!["k1", "k2"], vec!["k2"]]
    );
    assert_eq!(sink.errors().len(), 1);

    handle.stop();
    assert_eq!(source.subscriber_count(), 0);
}

#[tokio::test]
async fn test_broadcast_source_end_to_end() {
    let source = BroadcastCatalogSource::new(8, tokio::runtime::Handle::current());
    let sink = Arc::new(RecordingSink::default());
    let handle = open(&source, &FeedConfig::default(), Arc::clone(&sink)).unwrap();

    source.publish_snapshot("books", Some(remote_snapshot(&books(&["k1", "k2"]))));

    assert!(handle.wait_until_loaded().await);
    assert_eq!(ids(&handle.catalog()), vec!["k1", "k2"]);

    handle.stop();
    tokio::task::yield_now().await;
    source.publish_snapshot("books", None);
    tokio::task::yield_now().await;

    assert_eq!(sink.catalogs().len(), 1);
}

fn arb_entry() -> impl Strategy<Value = (bool, Value)> {
    prop_oneof![
        arb_book().prop_map(|record| (true, remote_entry(&record))),
        arb_book().prop_map(|record| {
            let mut entry = remote_entry(&record);
            entry["pages"] = json!("unknown");
            (false, entry)
        }),
        Just((false, json!(42))),
    ]
}

proptest! {
    #[test]
    fn prop_decoding_is_total(entries in prop::collection::vec(arb_entry(), 0..20)) {
        let total = entries.len();
        let valid = entries.iter().filter(|(ok, _)| *ok).count();
        let payload: Map<String, Value> = entries
            .into_iter()
            .enumerate()
            .map(|(index, (_, entry))| (format!("key{index:02}"), entry))
            .collect();

        let decoded = decode_snapshot(Some(&Value::Object(payload)));

        prop_assert_eq!(decoded.catalog.len(), valid);
        prop_assert_eq!(decoded.catalog.len() + decoded.dropped.len(), total);
        let keys: Vec<&str> = decoded.catalog.iter().map(|book| book.id.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(keys, sorted);
    }
}
