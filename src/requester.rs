//! Builds one bounded translation request and returns the raw reply.

use crate::language::TargetLanguage;
use crate::model::TranslationEntry;
use crate::openai::{BackendError, ChatBackend};
use serde::Serialize;
use tracing::info;

/// One element of the outbound payload.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RequestItem<'a> {
    pub id: usize,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_plural: Option<&'a str>,
}

/// Payload items for a batch; `id` is the position within the batch.
pub fn build_request_items<'a>(batch: &'a [&mut TranslationEntry]) -> Vec<RequestItem<'a>> {
    batch
        .iter()
        .enumerate()
        .map(|(id, entry)| RequestItem {
            id,
            text: &entry.singular_source_text,
            text_plural: entry.plural_source_text.as_deref(),
        })
        .collect()
}

/// Build the natural-language instruction wrapping the payload.
pub fn build_translation_prompt(items: &[RequestItem<'_>], language: &TargetLanguage) -> String {
    // Serializing borrowed strings and integers cannot fail
    let payload = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());

    format!(
        "I have a list of messages in english.\n\
         I need to translate them to {}.\n\
         \n\
         Reply with the same json list, but with the translated messages.\n\
         \n\
         {}",
        language.label(),
        payload
    )
}

/// Send one leaf batch to the backend and return its raw reply.
///
/// No retries here; the planner decides what to do with a failure.
pub async fn request_translation<B: ChatBackend>(
    backend: &B,
    batch: &[&mut TranslationEntry],
    language: &TargetLanguage,
) -> Result<String, BackendError> {
    let items = build_request_items(batch);
    let prompt = build_translation_prompt(&items, language);

    info!("Sending translation request for {} messages", batch.len());
    let reply = backend.complete(&prompt).await?;
    info!("Got translation reply");

    Ok(reply)
}
