//! Progress-callback trait for file- and page-level conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as a batch run moves through its files, and as the vision engine
//! moves through the pages of one file.
//!
//! # Example
//!
//! ```rust
//! use paper2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for FailureCounter {
//!     fn on_file_error(&self, file: &str, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file}: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes files and pages.
///
/// All methods have no-op defaults so callers only override what they care
/// about. Events arrive sequentially; the `Send + Sync` bound lets the
/// callback live inside a config shared with spawned tasks.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first file of a batch.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file is picked up.
    ///
    /// # Arguments
    /// * `file`: display name of the input
    /// * `index`: 1-indexed position in the batch
    /// * `total_files`: files in the batch (1 for single conversions)
    fn on_file_start(&self, file: &str, index: usize, total_files: usize) {
        let _ = (file, index, total_files);
    }

    /// Called just before the VLM request is sent for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been transcribed.
    ///
    /// `markdown_len` is the byte length of the page's Markdown.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        let _ = (page_num, total_pages, markdown_len);
    }

    /// Called after a file's outputs have been produced.
    fn on_file_complete(&self, file: &str, markdown_len: usize) {
        let _ = (file, markdown_len);
    }

    /// Called when a file fails; the batch continues with the next one.
    fn on_file_error(&self, file: &str, error: &str) {
        let _ = (file, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        files: AtomicUsize,
        pages: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_file_start(&self, _file: &str, _index: usize, _total_files: usize) {
            self.files.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _markdown_len: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _file: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total_files: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start("a.pdf", 1, 2);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_file_complete("a.pdf", 42);
        cb.on_file_error("b.pdf", "corrupt");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_file_start("a.pdf", 1, 2);
        tracker.on_page_complete(1, 2, 100);
        tracker.on_page_complete(2, 2, 80);
        tracker.on_file_start("b.pdf", 2, 2);
        tracker.on_file_error("b.pdf", "not a PDF");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.files.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_file_complete("x.pdf", 512);
    }
}
