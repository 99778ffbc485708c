//! # edgequake-webrag
//!
//! Ask questions about a webpage or a PDF using multimodal retrieval and a
//! vision-capable LLM.
//!
//! ## Why screenshots?
//!
//! Modern webpages lay text out in columns, cards and carousels that HTML
//! extraction flattens into noise. Instead this crate asks a scraper for a
//! full-page screenshot, slices it into a fixed number of PDF pages and
//! indexes those page *images*. At question time the best-matching page
//! images are handed straight to a vision model, which reads them the way a
//! person would.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL or uploaded PDF
//!  │
//!  ├─ 1. Validate  reject malformed URLs before any network call
//!  ├─ 2. Scrape    full-page screenshot (Firecrawl)
//!  ├─ 3. Paginate  slice into 10 PDF pages (CPU-bound, spawn_blocking)
//!  ├─ 4. Index     per-session collection (ColiVara), cached per document
//!  ├─ 5. Ask       retrieve top-k page images → vision LLM → streamed answer
//!  └─ 6. Dedup     drop blank and repeated lines, record in the transcript
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_webrag::{Assistant, AssistantConfig, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // FIRECRAWL_API_KEY / COLIVARA_API_KEY / OPENAI_API_KEY from the environment
//!     let mut assistant = Assistant::new(AssistantConfig::from_env())?;
//!     let mut session = assistant.start_session();
//!
//!     let source = SourceDocument::RemoteUrl("https://www.rust-lang.org".into());
//!     assistant.process(&mut session, source).await?;
//!
//!     let answer = session.ask("What is Rust?")?.complete(&mut session).await?;
//!     println!("{answer}");
//!
//!     assistant.end_session(&session);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `webrag` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-webrag = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assistant;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod rag;
pub mod retrieval;
pub mod scrape;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assistant::{Assistant, ProcessOutcome};
pub use config::{AssistantConfig, AssistantConfigBuilder, Language};
pub use error::{ErrorCategory, WebRagError};
pub use pipeline::dedup::deduplicate_lines;
pub use pipeline::input::{acquire, SourceDocument};
pub use pipeline::paginate::{create_pdf_from_screenshot, ScreenshotPdf, SliceRect};
pub use pipeline::url::{is_valid_url, validate_url};
pub use progress::{
    NoopProgressCallback, ProcessingProgressCallback, ProcessingStage, ProgressCallback,
};
pub use rag::{AnswerStream, EngineFactory, QueryEngine, RagEngine, RagEngineFactory};
pub use retrieval::{ColivaraClient, RetrievalClient, RetrievedPage};
pub use scrape::{FirecrawlClient, ScrapeClient, ScrapeRequest};
pub use session::{AnswerTurn, ChatEntry, DocumentCache, Role, SessionContext, Transcript};
