//! Orchestration: process a document for a session, summarize it, reattach
//! it after a reset and tear the session down.
//!
//! [`Assistant`] owns the collaborators and the [`DocumentCache`]. Sessions
//! are passed in explicitly; the assistant never holds on to one.

use crate::config::AssistantConfig;
use crate::error::WebRagError;
use crate::pipeline::input::{acquire_with_progress, SourceDocument};
use crate::progress::{
    NoopProgressCallback, ProcessingProgressCallback, ProcessingStage, ProgressCallback,
};
use crate::prompts::summary_prompt;
use crate::rag::{resolve_provider, EngineFactory, RagEngineFactory};
use crate::retrieval::{ColivaraClient, RetrievalClient};
use crate::scrape::{FirecrawlClient, ScrapeClient};
use crate::session::{collect_answer, DocumentCache, DocumentKey, SessionContext, SessionId};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Metadata attached to every session collection.
pub const COLLECTION_DESCRIPTION: &str = "Webpage/PDF content";

/// Name under which the processed document is indexed in its collection.
pub const INDEXED_DOCUMENT_NAME: &str = "document";

/// Result of [`Assistant::process`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub document_key: DocumentKey,
    pub document_path: PathBuf,
    /// `true` when the document was already indexed and nothing was uploaded
    /// to the retrieval service.
    pub reused_index: bool,
}

pub struct Assistant {
    config: AssistantConfig,
    scraper: Arc<dyn ScrapeClient>,
    retrieval: Arc<dyn RetrievalClient>,
    engines: Arc<dyn EngineFactory>,
    cache: DocumentCache,
    /// Document currently held by each session's collection.
    indexed: HashMap<SessionId, DocumentKey>,
    progress: ProgressCallback,
}

impl Assistant {
    /// Build an assistant talking to Firecrawl, ColiVara and the configured
    /// LLM provider.
    pub fn new(config: AssistantConfig) -> Result<Self, WebRagError> {
        let scraper = Arc::new(FirecrawlClient::new(&config)?);
        let retrieval = Arc::new(ColivaraClient::new(&config)?);
        let provider = resolve_provider(&config)?;
        let engines = Arc::new(RagEngineFactory::new(provider, &config));
        Ok(Self::with_collaborators(config, scraper, retrieval, engines))
    }

    /// Build an assistant over caller-supplied collaborators.
    pub fn with_collaborators(
        config: AssistantConfig,
        scraper: Arc<dyn ScrapeClient>,
        retrieval: Arc<dyn RetrievalClient>,
        engines: Arc<dyn EngineFactory>,
    ) -> Self {
        Self {
            config,
            scraper,
            retrieval,
            engines,
            cache: DocumentCache::new(),
            indexed: HashMap::new(),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// A new session using the configured collection prefix and language.
    pub fn start_session(&self) -> SessionContext {
        let session = SessionContext::new(&self.config.collection_prefix, self.config.language);
        info!("Session {} started", session.id());
        session
    }

    /// Make `source` the session's active document.
    ///
    /// The document is always acquired again (re-scraped or re-saved). It is
    /// indexed only when this session has no engine for it yet, or when the
    /// session's collection currently holds a different document. On error
    /// the cache and the session's attached engine are left as they were.
    pub async fn process(
        &mut self,
        session: &mut SessionContext,
        source: SourceDocument,
    ) -> Result<ProcessOutcome, WebRagError> {
        let progress = Arc::clone(&self.progress);
        let tracker = StageTracker::new(progress.as_ref());
        let result = self.process_tracked(session, &source, &tracker).await;
        match result {
            Ok(ref outcome) => progress.on_ready(&outcome.document_key),
            Err(ref e) => {
                warn!("Processing failed: {}", e);
                progress.on_error(tracker.current(), &e.to_string());
            }
        }
        result
    }

    async fn process_tracked(
        &mut self,
        session: &mut SessionContext,
        source: &SourceDocument,
        tracker: &StageTracker<'_>,
    ) -> Result<ProcessOutcome, WebRagError> {
        let key = source.document_key();
        let path =
            acquire_with_progress(source, self.scraper.as_ref(), &self.config, tracker).await?;
        info!("Document {} ready at {}", key, path.display());

        let (engine, reused_index) = match self.cache.get(session.id(), &key) {
            Some(engine) if self.indexed.get(&session.id()) == Some(&key) => {
                debug!("Reusing index for {}", key);
                tracker.on_cache_hit(&key);
                (engine, true)
            }
            Some(engine) => {
                // Engine known, but the collection holds another document.
                self.index(session, &key, &path, tracker).await?;
                (engine, false)
            }
            None => {
                self.index(session, &key, &path, tracker).await?;
                let engine = self
                    .engines
                    .build(Arc::clone(&self.retrieval), session.collection_name());
                self.cache.insert(session.id(), key.clone(), Arc::clone(&engine));
                (engine, false)
            }
        };

        session.attach(key.clone(), Some(path.clone()), engine);
        Ok(ProcessOutcome {
            document_key: key,
            document_path: path,
            reused_index,
        })
    }

    async fn index(
        &mut self,
        session: &SessionContext,
        key: &str,
        path: &Path,
        tracker: &StageTracker<'_>,
    ) -> Result<(), WebRagError> {
        tracker.on_stage(ProcessingStage::Indexing);
        let collection = session.collection_name();
        self.retrieval
            .create_collection(
                collection,
                serde_json::json!({ "description": COLLECTION_DESCRIPTION }),
            )
            .await?;

        // Whatever the collection held before is no longer known once an
        // upsert has been attempted.
        self.indexed.remove(&session.id());
        self.retrieval
            .upsert_document(collection, INDEXED_DOCUMENT_NAME, path)
            .await?;
        self.indexed.insert(session.id(), key.to_string());
        info!("Indexed {} into {}", key, collection);
        Ok(())
    }

    /// Reattach the session's last document after a [`SessionContext::reset`]
    /// without indexing it again. Returns `false` if that is not possible.
    pub fn attach_cached(&self, session: &mut SessionContext) -> bool {
        let Some(key) = session.document_key().map(str::to_string) else {
            return false;
        };
        if self.indexed.get(&session.id()) != Some(&key) {
            return false;
        }
        match self.cache.get(session.id(), &key) {
            Some(engine) => {
                debug!("Reattached {} to session {}", key, session.id());
                session.attach(key, None, engine);
                true
            }
            None => false,
        }
    }

    /// Concise summary of the attached document, in the session language.
    ///
    /// The transcript is not touched.
    pub async fn summarize(&self, session: &SessionContext) -> Result<String, WebRagError> {
        let engine = session.query_engine().ok_or(WebRagError::NoDocument)?;
        info!("Summarizing {}", session.document_key().unwrap_or("document"));
        collect_answer(engine.query(&summary_prompt(session.language()))).await
    }

    /// Drop everything cached for `session`.
    pub fn end_session(&mut self, session: &SessionContext) -> usize {
        self.indexed.remove(&session.id());
        let removed = self.cache.remove_session(session.id());
        info!("Session {} ended ({} cached documents dropped)", session.id(), removed);
        removed
    }
}

/// Forwards progress events and remembers the running stage.
struct StageTracker<'a> {
    inner: &'a dyn ProcessingProgressCallback,
    current: Mutex<Option<ProcessingStage>>,
}

impl<'a> StageTracker<'a> {
    fn new(inner: &'a dyn ProcessingProgressCallback) -> Self {
        Self {
            inner,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> Option<ProcessingStage> {
        self.current.lock().ok().and_then(|s| *s)
    }
}

impl ProcessingProgressCallback for StageTracker<'_> {
    fn on_stage(&self, stage: ProcessingStage) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(stage);
        }
        self.inner.on_stage(stage);
    }

    fn on_cache_hit(&self, document_key: &str) {
        self.inner.on_cache_hit(document_key);
    }
}
