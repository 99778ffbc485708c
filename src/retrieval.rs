//! Retrieval collaborator: multimodal document index and page search.
//!
//! Documents are indexed page-by-page as images; searching a collection
//! returns the best-matching page images, which the answer model then reads
//! directly. [`ColivaraClient`] implements [`RetrievalClient`] over the
//! ColiVara REST API.

use crate::config::AssistantConfig;
use crate::error::WebRagError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "colivara";

/// One page returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPage {
    pub document_name: String,
    pub page_number: u32,
    /// Relevance in `[0, 1]`.
    #[serde(default, alias = "normalized_score")]
    pub score: f64,
    /// Base64 page image, with or without a `data:` prefix.
    pub img_base64: String,
}

impl RetrievedPage {
    /// Bare base64 payload and MIME type of the page image.
    pub fn image_payload(&self) -> (&str, &str) {
        match self.img_base64.split_once(',') {
            Some((header, data)) if header.starts_with("data:") => {
                let mime = header
                    .trim_start_matches("data:")
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or("image/png");
                (data, mime)
            }
            _ => (self.img_base64.as_str(), "image/png"),
        }
    }
}

/// A multimodal retrieval backend.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Create a collection. An already existing collection is not an error.
    async fn create_collection(
        &self,
        name: &str,
        metadata: serde_json::Value,
    ) -> Result<(), WebRagError>;

    /// Index (or re-index) the document at `document_path` under `document_name`.
    async fn upsert_document(
        &self,
        collection_name: &str,
        document_name: &str,
        document_path: &Path,
    ) -> Result<(), WebRagError>;

    /// The `top_k` pages of `collection_name` best matching `query`.
    async fn search(
        &self,
        collection_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPage>, WebRagError>;
}

#[derive(Debug, Serialize)]
struct CreateCollectionBody<'a> {
    name: &'a str,
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct UpsertDocumentBody<'a> {
    name: &'a str,
    collection_name: &'a str,
    base64: String,
    metadata: serde_json::Value,
    wait: bool,
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    collection_name: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RetrievedPage>,
}

/// ColiVara HTTP client.
#[derive(Clone)]
pub struct ColivaraClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ColivaraClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, WebRagError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| WebRagError::collaborator(SERVICE, e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.colivara_base_url.trim_end_matches('/').to_string(),
            api_key: config.colivara_api_key.clone(),
        })
    }

    /// POST `body` to `path`, returning the status and body text.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(reqwest::StatusCode, String), WebRagError> {
        let mut call = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        if let Some(ref key) = self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call
            .send()
            .await
            .map_err(|e| WebRagError::collaborator(SERVICE, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WebRagError::collaborator(SERVICE, e.to_string()))?;
        Ok((status, text))
    }
}

fn http_error(status: reqwest::StatusCode, body: &str) -> WebRagError {
    let detail: String = body.chars().take(200).collect();
    WebRagError::collaborator(SERVICE, format!("HTTP {status}: {detail}"))
}

#[async_trait]
impl RetrievalClient for ColivaraClient {
    async fn create_collection(
        &self,
        name: &str,
        metadata: serde_json::Value,
    ) -> Result<(), WebRagError> {
        info!("Creating collection {}", name);
        let (status, body) = self
            .post("/v1/collections/", &CreateCollectionBody { name, metadata })
            .await?;
        if status == reqwest::StatusCode::CONFLICT {
            debug!("Collection {} already exists", name);
            return Ok(());
        }
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        Ok(())
    }

    async fn upsert_document(
        &self,
        collection_name: &str,
        document_name: &str,
        document_path: &Path,
    ) -> Result<(), WebRagError> {
        let bytes = tokio::fs::read(document_path)
            .await
            .map_err(|e| WebRagError::ReadFailed {
                path: document_path.to_path_buf(),
                source: e,
            })?;
        info!(
            "Indexing {} ({} bytes) into {}",
            document_path.display(),
            bytes.len(),
            collection_name
        );

        let body = UpsertDocumentBody {
            name: document_name,
            collection_name,
            base64: STANDARD.encode(&bytes),
            metadata: serde_json::json!({}),
            wait: true,
        };
        let (status, text) = self.post("/v1/documents/upsert-document/", &body).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        Ok(())
    }

    async fn search(
        &self,
        collection_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPage>, WebRagError> {
        let body = SearchBody {
            query,
            collection_name,
            top_k,
        };
        let (status, text) = self.post("/v1/search/", &body).await?;
        if !status.is_success() {
            return Err(http_error(status, &text));
        }
        let parsed: SearchResponse = serde_json::from_str(&text).map_err(|e| {
            WebRagError::collaborator(SERVICE, format!("invalid search response: {e}"))
        })?;
        debug!(
            "Search returned pages {:?}",
            parsed
                .results
                .iter()
                .map(|p| p.page_number)
                .collect::<Vec<_>>()
        );
        Ok(parsed.results)
    }
}
