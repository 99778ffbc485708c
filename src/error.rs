//! Error types for the edgequake-webrag library.
//!
//! Every failure of a user-initiated action (process a document, ask a
//! question, request a summary) surfaces as one [`WebRagError`]. Each variant
//! belongs to exactly one [`ErrorCategory`] so front ends can decide how to
//! render it without matching on every variant:
//!
//! * **Validation**: the input was rejected before any network call.
//! * **Fetch**: the screenshot image could not be downloaded.
//! * **Scrape**: the scraping service returned no screenshot.
//! * **Collaborator**: the scraping, retrieval or LLM service failed.
//!
//! No variant is ever retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`WebRagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Fetch,
    Scrape,
    Collaborator,
    Io,
    Config,
    Internal,
}

/// All errors returned by the edgequake-webrag library.
#[derive(Debug, Error)]
pub enum WebRagError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The URL is missing a scheme or a host.
    #[error("Invalid URL '{input}': expected an absolute URL such as https://example.com")]
    InvalidUrl { input: String },

    /// A question was asked before any document was processed.
    #[error("No document is loaded for this session.\nProcess a URL or upload a PDF first.")]
    NoDocument,

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The screenshot URL answered with a failure status or the transfer broke.
    #[error("Failed to download screenshot '{url}': {reason}")]
    ScreenshotDownloadFailed { url: String, reason: String },

    /// The screenshot download exceeded the configured timeout.
    #[error("Screenshot download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    ScreenshotDownloadTimeout { url: String, secs: u64 },

    /// The downloaded payload is not a decodable raster image.
    #[error("Screenshot is not a decodable image: {detail}")]
    ImageDecodeFailed { detail: String },

    /// The decoded image has no pixels.
    #[error("Screenshot has empty dimensions {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    // ── Scrape errors ─────────────────────────────────────────────────────
    /// The scraping service answered but returned no screenshot.
    #[error("No screenshot returned for '{url}'. The page may not be accessible.")]
    NoScreenshot { url: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// A call to an external service (scraper, retrieval backend, LLM) failed.
    #[error("{service} request failed: {message}")]
    Collaborator { service: String, message: String },

    /// No LLM provider could be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The assembled PDF could not be built.
    #[error("Failed to assemble PDF: {detail}")]
    PdfAssemblyFailed { detail: String },

    /// Could not write a document to the work directory.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read a document back for indexing.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebRagError {
    /// Shorthand for a [`WebRagError::Collaborator`] error.
    pub fn collaborator(service: &str, message: impl Into<String>) -> Self {
        WebRagError::Collaborator {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            WebRagError::InvalidUrl { .. } | WebRagError::NoDocument => ErrorCategory::Validation,
            WebRagError::ScreenshotDownloadFailed { .. }
            | WebRagError::ScreenshotDownloadTimeout { .. }
            | WebRagError::ImageDecodeFailed { .. }
            | WebRagError::EmptyImage { .. } => ErrorCategory::Fetch,
            WebRagError::NoScreenshot { .. } => ErrorCategory::Scrape,
            WebRagError::Collaborator { .. } | WebRagError::ProviderNotConfigured { .. } => {
                ErrorCategory::Collaborator
            }
            WebRagError::PdfAssemblyFailed { .. }
            | WebRagError::OutputWriteFailed { .. }
            | WebRagError::ReadFailed { .. } => ErrorCategory::Io,
            WebRagError::InvalidConfig(_) => ErrorCategory::Config,
            WebRagError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_display() {
        let e = WebRagError::InvalidUrl {
            input: "example.com".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("example.com"), "got: {msg}");
        assert!(msg.contains("https://example.com"));
        assert_eq!(e.category(), ErrorCategory::Validation);
    }

    #[test]
    fn download_failed_is_fetch() {
        let e = WebRagError::ScreenshotDownloadFailed {
            url: "https://cdn.example.com/shot.png".into(),
            reason: "HTTP 404 Not Found".into(),
        };
        assert!(e.to_string().contains("404"));
        assert_eq!(e.category(), ErrorCategory::Fetch);
    }

    #[test]
    fn no_screenshot_is_scrape() {
        let e = WebRagError::NoScreenshot {
            url: "https://example.com".into(),
        };
        assert!(e.to_string().contains("may not be accessible"));
        assert_eq!(e.category(), ErrorCategory::Scrape);
    }

    #[test]
    fn collaborator_display() {
        let e = WebRagError::collaborator("colivara", "HTTP 401: invalid token");
        assert_eq!(e.to_string(), "colivara request failed: HTTP 401: invalid token");
        assert_eq!(e.category(), ErrorCategory::Collaborator);
    }

    #[test]
    fn timeout_display() {
        let e = WebRagError::ScreenshotDownloadTimeout {
            url: "https://cdn.example.com/shot.png".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }
}
