//! Progress-callback trait for document processing events.
//!
//! Pass an [`Arc<dyn ProcessingProgressCallback>`] to
//! [`crate::assistant::Assistant::with_progress`] to be told which stage a
//! document is in while it is scraped, paginated and indexed. Indexing can
//! take minutes, so a front end usually wants to show something.
//!
//! # Example
//!
//! ```rust
//! use edgequake_webrag::{ProcessingProgressCallback, ProcessingStage};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog(Mutex<Vec<ProcessingStage>>);
//!
//! impl ProcessingProgressCallback for StageLog {
//!     fn on_stage(&self, stage: ProcessingStage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog(Mutex::new(Vec::new())));
//! log.on_stage(ProcessingStage::Scraping);
//! assert_eq!(log.0.lock().unwrap().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

/// One step of [`crate::assistant::Assistant::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// Asking the scraper for a full-page screenshot.
    Scraping,
    /// Downloading the screenshot and slicing it into a PDF.
    CreatingPdf,
    /// Writing an uploaded PDF into the work directory.
    SavingUpload,
    /// Creating the collection and indexing the document.
    Indexing,
}

impl ProcessingStage {
    pub fn label(self) -> &'static str {
        match self {
            ProcessingStage::Scraping => "Scraping webpage",
            ProcessingStage::CreatingPdf => "Creating PDF from screenshot",
            ProcessingStage::SavingUpload => "Saving uploaded PDF",
            ProcessingStage::Indexing => "Indexing document",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the assistant while it processes a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProcessingProgressCallback: Send + Sync {
    /// A new stage has started.
    fn on_stage(&self, stage: ProcessingStage) {
        let _ = stage;
    }

    /// The document was already indexed for this session and will not be
    /// indexed again.
    fn on_cache_hit(&self, document_key: &str) {
        let _ = document_key;
    }

    /// Processing finished and the document is ready for questions.
    fn on_ready(&self, document_key: &str) {
        let _ = document_key;
    }

    /// Processing stopped.
    ///
    /// # Arguments
    /// * `stage`: the stage that was running, if any
    /// * `error`: human-readable error description
    fn on_error(&self, stage: Option<ProcessingStage>, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type held by the assistant.
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;
