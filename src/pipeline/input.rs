//! Input acquisition: resolve the user's source document to one local PDF.
//!
//! A webpage URL is scraped for a full-page screenshot, which is then
//! paginated into [`SCREENSHOT_PDF_NAME`](super::paginate::SCREENSHOT_PDF_NAME).
//! An uploaded PDF is written verbatim as `uploaded_<name>`. Either way the
//! caller gets back a single path ready for indexing.

use crate::config::AssistantConfig;
use crate::error::WebRagError;
use crate::pipeline::paginate::create_pdf_from_screenshot;
use crate::pipeline::url::validate_url;
use crate::pipeline::write_document;
use crate::progress::{NoopProgressCallback, ProcessingProgressCallback, ProcessingStage};
use crate::scrape::{ScrapeClient, ScrapeRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of uploaded files inside the work directory.
pub const UPLOAD_PREFIX: &str = "uploaded_";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));

/// The document a session works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDocument {
    /// A webpage to capture.
    RemoteUrl(String),
    /// A PDF supplied directly by the user.
    UploadedBlob { bytes: Vec<u8>, filename: String },
}

impl SourceDocument {
    /// Pick the source from the two optional inputs.
    ///
    /// The URL wins when both are present. An empty (or whitespace) URL
    /// counts as absent. Returns `None` when nothing was supplied.
    pub fn from_inputs(url: Option<&str>, upload: Option<(Vec<u8>, String)>) -> Option<Self> {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) => Some(SourceDocument::RemoteUrl(u.to_string())),
            None => upload.map(|(bytes, filename)| SourceDocument::UploadedBlob { bytes, filename }),
        }
    }

    /// Read an upload from disk, keeping only its file name.
    pub fn from_file(path: &Path) -> Result<Self, WebRagError> {
        let bytes = std::fs::read(path).map_err(|e| WebRagError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(SourceDocument::UploadedBlob { bytes, filename })
    }

    /// Stable key identifying this document within a session.
    pub fn document_key(&self) -> String {
        match self {
            SourceDocument::RemoteUrl(url) => url.clone(),
            SourceDocument::UploadedBlob { filename, .. } => {
                format!("{UPLOAD_PREFIX}{}", sanitize_filename(filename))
            }
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, SourceDocument::RemoteUrl(_))
    }
}

/// Final path component of `filename`, restricted to `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    // "." and ".." would escape or alias the work directory.
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "document.pdf".to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Resolve `source` to a local PDF path under `config.work_dir`.
///
/// URLs are validated before any network call. A scrape that returns no
/// screenshot fails with [`WebRagError::NoScreenshot`].
pub async fn acquire(
    source: &SourceDocument,
    scraper: &dyn ScrapeClient,
    config: &AssistantConfig,
) -> Result<PathBuf, WebRagError> {
    acquire_with_progress(source, scraper, config, &NoopProgressCallback).await
}

/// [`acquire`], reporting each stage to `progress` as it starts.
pub async fn acquire_with_progress(
    source: &SourceDocument,
    scraper: &dyn ScrapeClient,
    config: &AssistantConfig,
    progress: &dyn ProcessingProgressCallback,
) -> Result<PathBuf, WebRagError> {
    match source {
        SourceDocument::RemoteUrl(url) => {
            validate_url(url)?;
            progress.on_stage(ProcessingStage::Scraping);
            let request = ScrapeRequest::full_page_screenshot(url.as_str(), config.scrape_wait_ms);
            let screenshot = scraper
                .screenshot(&request)
                .await?
                .ok_or_else(|| WebRagError::NoScreenshot { url: url.clone() })?;
            progress.on_stage(ProcessingStage::CreatingPdf);
            let pdf = create_pdf_from_screenshot(&screenshot, config).await?;
            Ok(pdf.path)
        }
        SourceDocument::UploadedBlob { bytes, filename } => {
            progress.on_stage(ProcessingStage::SavingUpload);
            let path = config.work_dir.join(source.document_key());
            debug!("Upload {} saved as {}", filename, path.display());
            write_document(&path, bytes)?;
            info!("Saved upload ({} bytes) to {}", bytes.len(), path.display());
            Ok(path)
        }
    }
}
