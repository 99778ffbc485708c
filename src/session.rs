//! Per-session state: conversation transcript, attached document and the
//! process-wide cache of indexed documents.
//!
//! A [`SessionContext`] is created when a user session starts and passed to
//! every operation; nothing about a session lives in globals. The
//! [`DocumentCache`] is shared by all sessions but keyed by
//! `(SessionId, DocumentKey)`, so one session never sees another's index.

use crate::config::Language;
use crate::error::WebRagError;
use crate::pipeline::dedup::deduplicate_lines;
use crate::prompts::localized;
use crate::rag::{AnswerStream, QueryEngine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::debug;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Identifies a document within a session: the URL, or `uploaded_<name>`.
pub type DocumentKey = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

impl ChatEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only conversation log, cleared only by [`SessionContext::reset`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
}

impl Transcript {
    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

// ── Document cache ───────────────────────────────────────────────────────

/// Indexed documents, keyed by session and document.
///
/// Entries live until [`DocumentCache::remove_session`] is called for their
/// session. There is no size bound or expiry.
#[derive(Clone, Default)]
pub struct DocumentCache {
    entries: HashMap<(SessionId, DocumentKey), Arc<dyn QueryEngine>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session: SessionId, key: &str) -> Option<Arc<dyn QueryEngine>> {
        self.entries.get(&(session, key.to_string())).cloned()
    }

    pub fn contains(&self, session: SessionId, key: &str) -> bool {
        self.entries.contains_key(&(session, key.to_string()))
    }

    pub fn insert(&mut self, session: SessionId, key: DocumentKey, engine: Arc<dyn QueryEngine>) {
        self.entries.insert((session, key), engine);
    }

    /// Drop every entry belonging to `session`. Returns how many were removed.
    pub fn remove_session(&mut self, session: SessionId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(id, _), _| *id != session);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// Everything one user session owns.
pub struct SessionContext {
    id: SessionId,
    collection_name: String,
    language: Language,
    document_key: Option<DocumentKey>,
    document_path: Option<PathBuf>,
    transcript: Transcript,
    query_engine: Option<Arc<dyn QueryEngine>>,
}

impl SessionContext {
    /// Start a session with a fresh id. Its collection is named
    /// `<collection_prefix><id>`.
    pub fn new(collection_prefix: &str, language: Language) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            collection_name: format!("{collection_prefix}{id}"),
            language,
            document_key: None,
            document_path: None,
            transcript: Transcript::default(),
            query_engine: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Takes effect from the next question on.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Key of the most recently processed document.
    pub fn document_key(&self) -> Option<&str> {
        self.document_key.as_deref()
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// `true` when a document is attached and questions can be asked.
    pub fn is_ready(&self) -> bool {
        self.query_engine.is_some()
    }

    pub(crate) fn query_engine(&self) -> Option<&Arc<dyn QueryEngine>> {
        self.query_engine.as_ref()
    }

    pub(crate) fn attach(
        &mut self,
        key: DocumentKey,
        path: Option<PathBuf>,
        engine: Arc<dyn QueryEngine>,
    ) {
        self.document_key = Some(key);
        if path.is_some() {
            self.document_path = path;
        }
        self.query_engine = Some(engine);
    }

    /// Clear the transcript and detach the query engine.
    ///
    /// The engine stays in the [`DocumentCache`]; the document key and path
    /// are kept so the same document can be reattached without indexing it
    /// again.
    pub fn reset(&mut self) {
        debug!(
            "Resetting session {} ({} transcript entries)",
            self.id,
            self.transcript.len()
        );
        self.transcript.clear();
        self.query_engine = None;
    }

    /// Ask a question about the attached document.
    ///
    /// The prompt is recorded in the transcript as typed; the engine receives
    /// it with the language instruction prepended. Nothing is sent until the
    /// returned turn is polled.
    pub fn ask(&mut self, prompt: &str) -> Result<AnswerTurn, WebRagError> {
        let engine = self.query_engine.as_ref().ok_or(WebRagError::NoDocument)?;
        let stream = engine.query(&localized(prompt, self.language));
        self.transcript.push(ChatEntry::user(prompt));
        Ok(AnswerTurn {
            stream,
            buffer: String::new(),
        })
    }
}

/// An answer being streamed.
///
/// Pull fragments with [`next_chunk`](Self::next_chunk) to display them as
/// they arrive, then call [`finish`](Self::finish) to record the
/// deduplicated answer. Dropping the turn without finishing abandons the
/// answer and leaves only the question in the transcript.
pub struct AnswerTurn {
    stream: AnswerStream,
    buffer: String,
}

impl AnswerTurn {
    /// Next fragment, also appended to [`partial`](Self::partial).
    pub async fn next_chunk(&mut self) -> Option<Result<String, WebRagError>> {
        let item = self.stream.next().await?;
        if let Ok(ref fragment) = item {
            self.buffer.push_str(fragment);
        }
        Some(item)
    }

    /// Everything received so far, verbatim.
    pub fn partial(&self) -> &str {
        &self.buffer
    }

    /// Deduplicate the received text and append it to the transcript.
    pub fn finish(self, session: &mut SessionContext) -> String {
        let answer = deduplicate_lines(&self.buffer);
        session.transcript.push(ChatEntry::assistant(answer.clone()));
        answer
    }

    /// Drain the stream, then [`finish`](Self::finish).
    ///
    /// On a stream error the assistant entry is not recorded.
    pub async fn complete(mut self, session: &mut SessionContext) -> Result<String, WebRagError> {
        while let Some(item) = self.next_chunk().await {
            item?;
        }
        Ok(self.finish(session))
    }
}

/// Concatenate a whole answer stream.
pub async fn collect_answer(mut stream: AnswerStream) -> Result<String, WebRagError> {
    let mut out = String::new();
    while let Some(fragment) = stream.next().await {
        out.push_str(&fragment?);
    }
    Ok(out)
}
