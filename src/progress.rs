//! Progress-callback trait for transcription events.
//!
//! Inject an [`Arc<dyn TranscriptionProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! per-document, per-page events while the Transcriber works. Callbacks only
//! observe; nothing they do changes what is written to disk.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfbatch::{PipelineConfig, TranscriptionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TranscriptionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, doc: &str, page_num: usize, processed: usize, total: usize, _len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{doc}: page {page_num} ({processed}/{total})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn TranscriptionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the Transcriber as it processes each document and page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `processed` counts pages attempted so far within the
/// current document (successes and failures), `total` is the number of images
/// found for it.
pub trait TranscriptionProgressCallback: Send + Sync {
    /// Called once before the first document.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before the first page of a document.
    fn on_document_start(&self, doc_name: &str, total_pages: usize) {
        let _ = (doc_name, total_pages);
    }

    /// Called just before the VLM request is sent for a page.
    fn on_page_start(&self, doc_name: &str, page_num: usize, total_pages: usize) {
        let _ = (doc_name, page_num, total_pages);
    }

    /// Called when a page fragment has been written.
    fn on_page_complete(
        &self,
        doc_name: &str,
        page_num: usize,
        processed: usize,
        total_pages: usize,
        markdown_len: usize,
    ) {
        let _ = (doc_name, page_num, processed, total_pages, markdown_len);
    }

    /// Called when a page failed.
    fn on_page_error(
        &self,
        doc_name: &str,
        page_num: usize,
        processed: usize,
        total_pages: usize,
        error: &str,
    ) {
        let _ = (doc_name, page_num, processed, total_pages, error);
    }

    /// Called after the last page of a document was attempted.
    fn on_document_complete(&self, doc_name: &str, total_pages: usize, success_count: usize) {
        let _ = (doc_name, total_pages, success_count);
    }

    /// Called once after all documents have been attempted (or the batch aborted).
    fn on_batch_complete(&self, total_documents: usize, failed_pages: usize) {
        let _ = (total_documents, failed_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranscriptionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn TranscriptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        documents: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        last_processed: AtomicUsize,
    }

    impl TranscriptionProgressCallback for TrackingCallback {
        fn on_document_start(&self, _doc: &str, _total: usize) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _d: &str, _p: usize, processed: usize, _t: usize, _l: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.last_processed.store(processed, Ordering::SeqCst);
        }

        fn on_page_error(&self, _d: &str, _p: usize, processed: usize, _t: usize, _e: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
            self.last_processed.store(processed, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a", 3);
        cb.on_page_start("a", 1, 3);
        cb.on_page_complete("a", 1, 1, 3, 42);
        cb.on_page_error("a", 2, 2, 3, "boom");
        cb.on_document_complete("a", 3, 2);
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start("report", 3);
        tracker.on_page_complete("report", 1, 1, 3, 100);
        tracker.on_page_error("report", 2, 2, 3, "timeout");
        tracker.on_page_complete("report", 3, 3, 3, 80);

        assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.last_processed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_page_start("doc", 1, 10);
    }
}
