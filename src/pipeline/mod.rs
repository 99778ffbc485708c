//! Pipeline stages that turn user input into an indexable PDF and clean up
//! the answers that come back.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─ url ──▶ scrape (external) ──▶ paginate ──▶ encode ─┐
//! input ─────┤                                                     ├──▶ PDF path
//!            └─ upload ──▶ write verbatim ─────────────────────────┘
//!
//! answer stream ──▶ dedup ──▶ transcript
//! ```
//!
//! 1. [`url`]      reject malformed URLs before any network call
//! 2. [`paginate`] slice a full-page screenshot into a fixed-page PDF;
//!    runs in `spawn_blocking` because decoding and deflating are CPU-bound
//! 3. [`encode`]   wrap each slice as a PDF image XObject
//! 4. [`input`]    resolve either input branch to one canonical PDF path
//! 5. [`dedup`]    drop blank and repeated lines from a finished answer

pub mod dedup;
pub mod encode;
pub mod input;
pub mod paginate;
pub mod url;

use crate::error::WebRagError;
use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path`, replacing any existing file.
///
/// Data goes to a temp file in the destination directory which is renamed
/// over `path` once complete; on any failure the temp file is removed when
/// it is dropped, so readers never observe a partial document.
pub(crate) fn write_document(path: &Path, bytes: &[u8]) -> Result<(), WebRagError> {
    let write_err = |source: std::io::Error| WebRagError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
