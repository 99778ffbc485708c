//! Prompts sent to the answer model.
//!
//! Callers can override the answer system prompt via
//! [`crate::config::AssistantConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

use crate::config::Language;

/// Default system prompt for answering a question over retrieved page images.
pub const DEFAULT_ANSWER_PROMPT: &str = r#"You are a helpful assistant answering questions about a document.

The user message contains the question followed by images of the document pages most relevant to it. Some pages may be slices of a long webpage screenshot.

Rules:
1. Answer ONLY from what is visible in the page images.
2. If the pages do not contain the answer, say so plainly.
3. Quote numbers, names and dates exactly as they appear.
4. Be concise. Use short paragraphs or bullet points.
5. Do not describe the images themselves unless asked."#;

/// Fixed question behind the summary action.
pub const SUMMARY_PROMPT: &str = "Please provide a concise summary of the document.";

/// Prefix `prompt` with the language instruction for `language`.
pub fn localized(prompt: &str, language: Language) -> String {
    format!("{}{}", language.instruction_prefix(), prompt)
}

/// Localized summary prompt.
pub fn summary_prompt(language: Language) -> String {
    localized(SUMMARY_PROMPT, language)
}
