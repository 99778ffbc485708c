//! Question answering over an indexed document.
//!
//! A [`QueryEngine`] turns a prompt into an [`AnswerStream`]: a lazy, finite,
//! non-restartable sequence of text fragments. Nothing is sent to any service
//! until the stream is first polled, and dropping the stream cancels the
//! request, so consumers stop early by simply not pulling further.
//!
//! [`RagEngine`] is the production engine: it searches the retrieval
//! collection for the page images best matching the question and hands them,
//! together with the question, to a vision-capable LLM.

use crate::config::AssistantConfig;
use crate::error::WebRagError;
use crate::prompts::DEFAULT_ANSWER_PROMPT;
use crate::retrieval::{RetrievalClient, RetrievedPage};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed stream of answer fragments.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String, WebRagError>> + Send>>;

/// Something that can answer questions about one indexed document.
pub trait QueryEngine: Send + Sync {
    /// Start answering `prompt`. A new call is needed to ask again.
    fn query(&self, prompt: &str) -> AnswerStream;
}

/// Builds the query engine for a freshly indexed collection.
pub trait EngineFactory: Send + Sync {
    fn build(
        &self,
        retrieval: Arc<dyn RetrievalClient>,
        collection_name: &str,
    ) -> Arc<dyn QueryEngine>;
}

/// Retrieval-augmented engine: page search + multimodal completion.
#[derive(Clone)]
pub struct RagEngine {
    retrieval: Arc<dyn RetrievalClient>,
    provider: Arc<dyn LLMProvider>,
    collection_name: String,
    top_k: usize,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl RagEngine {
    pub fn new(
        retrieval: Arc<dyn RetrievalClient>,
        provider: Arc<dyn LLMProvider>,
        collection_name: impl Into<String>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            retrieval,
            provider,
            collection_name: collection_name.into(),
            top_k: config.top_k,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_ANSWER_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Retrieve pages and run one completion, returning the whole answer.
    pub async fn answer(&self, prompt: &str) -> Result<String, WebRagError> {
        let pages = self
            .retrieval
            .search(&self.collection_name, prompt, self.top_k)
            .await?;
        info!(
            "Answering from {} retrieved pages of {}",
            pages.len(),
            self.collection_name
        );

        let images: Vec<ImageData> = pages.iter().map(page_image).collect();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(prompt, images),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| WebRagError::collaborator("llm", e.to_string()))?;
        debug!(
            "Answer: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

impl QueryEngine for RagEngine {
    fn query(&self, prompt: &str) -> AnswerStream {
        let engine = self.clone();
        let prompt = prompt.to_string();
        let fragments = stream::once(async move { engine.answer(&prompt).await })
            .map_ok(|text| stream::iter(split_fragments(&text).into_iter().map(Ok::<_, WebRagError>)))
            .try_flatten();
        Box::pin(fragments)
    }
}

/// [`EngineFactory`] producing [`RagEngine`]s that share one LLM provider.
pub struct RagEngineFactory {
    provider: Arc<dyn LLMProvider>,
    config: AssistantConfig,
}

impl RagEngineFactory {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AssistantConfig) -> Self {
        Self {
            provider,
            config: config.clone(),
        }
    }
}

impl EngineFactory for RagEngineFactory {
    fn build(
        &self,
        retrieval: Arc<dyn RetrievalClient>,
        collection_name: &str,
    ) -> Arc<dyn QueryEngine> {
        Arc::new(RagEngine::new(
            retrieval,
            Arc::clone(&self.provider),
            collection_name,
            &self.config,
        ))
    }
}

/// Split an answer into line fragments that concatenate back to `text`.
pub fn split_fragments(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

fn page_image(page: &RetrievedPage) -> ImageData {
    let (data, mime) = page.image_payload();
    ImageData::new(data.to_string(), mime).with_detail("high")
}

// ── Provider resolution ──────────────────────────────────────────────────

const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Resolve the answer model, from most-specific to least-specific:
///
/// 1. pre-built provider (`config.provider`)
/// 2. named provider + model (`config.provider_name`)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env()` auto-detection
pub fn resolve_provider(config: &AssistantConfig) -> Result<Arc<dyn LLMProvider>, WebRagError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| WebRagError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, WebRagError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        WebRagError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
