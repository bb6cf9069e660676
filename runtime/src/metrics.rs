//! Prometheus metrics for observability and monitoring.
//!
//! This module names and describes every metric the Bookshelf components
//! record:
//! - Store command processing and listener notification
//! - Catalog snapshot decoding and transport errors
//!
//! Recording goes through the `metrics` facade, so nothing is exported until a
//! recorder is installed. [`PrometheusRecorder`] installs one and renders the
//! text exposition format on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookshelf_runtime::metrics::PrometheusRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = PrometheusRecorder::new();
//! recorder.install()?;
//!
//! // ... run the session ...
//!
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Commands dispatched to a store
pub const STORE_COMMANDS_TOTAL: &str = "store_commands_total";
/// Commands rejected by a reducer
pub const STORE_COMMANDS_REJECTED_TOTAL: &str = "store_commands_rejected_total";
/// Listener invocations after a state change
pub const STORE_NOTIFICATIONS_TOTAL: &str = "store_notifications_total";
/// Reducer execution time
pub const STORE_REDUCER_DURATION_SECONDS: &str = "store_reducer_duration_seconds";
/// Snapshots decoded by the catalog feed
pub const CATALOG_SNAPSHOTS_TOTAL: &str = "catalog_snapshots_total";
/// Malformed entries left out of a rebuilt catalog
pub const CATALOG_ENTRIES_DROPPED_TOTAL: &str = "catalog_entries_dropped_total";
/// Transport errors reported by a catalog source
pub const CATALOG_ERRORS_TOTAL: &str = "catalog_errors_total";
/// Books in the most recent catalog
pub const CATALOG_BOOKS: &str = "catalog_books";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder.
///
/// Installs a global Prometheus recorder and renders the collected metrics.
#[derive(Default)]
pub struct PrometheusRecorder {
    handle: Option<PrometheusHandle>,
}

impl PrometheusRecorder {
    /// Create a recorder that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the recorder globally.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a different recorder is
    /// already installed.
    ///
    /// # Note
    ///
    /// Installing twice in the same process (e.g., in tests) is tolerated: the
    /// second call logs a warning and leaves this recorder without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        describe_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for PrometheusRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRecorder")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

/// Register all metric descriptions.
pub fn describe_metrics() {
    // Store Metrics
    describe_counter!(STORE_COMMANDS_TOTAL, "Total number of commands dispatched to stores");
    describe_counter!(
        STORE_COMMANDS_REJECTED_TOTAL,
        "Total number of commands rejected by validation"
    );
    describe_counter!(
        STORE_NOTIFICATIONS_TOTAL,
        "Total number of listener invocations after state changes"
    );
    describe_histogram!(STORE_REDUCER_DURATION_SECONDS, "Time taken to execute reducers");

    // Catalog Metrics
    describe_counter!(CATALOG_SNAPSHOTS_TOTAL, "Total number of catalog snapshots decoded");
    describe_counter!(
        CATALOG_ENTRIES_DROPPED_TOTAL,
        "Total number of malformed catalog entries dropped"
    );
    describe_counter!(CATALOG_ERRORS_TOTAL, "Total number of catalog transport errors");
    describe_gauge!(CATALOG_BOOKS, "Number of books in the current catalog");
}
