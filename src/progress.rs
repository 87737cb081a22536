//! Progress-callback trait for per-document processing events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::ProcessorConfigBuilder::progress_callback`] to receive
//! events as workers pick up and finish documents. The CLI uses this to
//! drive its progress bar.
//!
//! # Example
//!
//! ```rust
//! use darm2sql::{ProcessorConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl RunProgressCallback for Counter {
//!     fn on_document_complete(&self, _index: usize, _total: usize, guide: Option<&str>) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("guide {}", guide.unwrap_or("SEM_GUIA"));
//!     }
//! }
//!
//! let config = ProcessorConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the processing engine as it handles each document.
///
/// Per-document methods are invoked from worker threads, possibly
/// concurrently; implementations must synchronise their own state. All
/// methods default to no-ops.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after discovery, before any document is read.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// A worker picked up the document at `index` (0-based discovery order).
    fn on_document_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// A record was extracted and its statement produced.
    fn on_document_complete(&self, index: usize, total: usize, guide: Option<&str>) {
        let _ = (index, total, guide);
    }

    /// Text was read but the required fields were missing.
    fn on_document_skipped(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// The document could not be read or its output could not be written.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the batch is consolidated.
    fn on_run_complete(&self, total_documents: usize, accepted: usize) {
        let _ = (total_documents, accepted);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessorConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
