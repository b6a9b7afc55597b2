//! Validation and application of backend replies.
//!
//! The reply is untrusted text. It is decoded into `ReplyItem`s, checked
//! against the batch as a whole, and only then written onto the entries, so
//! a batch is either fully updated or left untouched.

use crate::model::TranslationEntry;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Ways a reply can fail to match its batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("could not find a JSON list in the reply")]
    Unparseable,

    #[error("could not load JSON from the reply: {0}")]
    Malformed(String),

    #[error("reply has {actual} items but the batch has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("reply item {index} is missing its id")]
    MissingId { index: usize },

    #[error("reply item {index} has id {found}, replies must keep batch order")]
    OrderMismatch { index: usize, found: String },

    #[error("reply item {index} is missing text")]
    MissingTextField { index: usize },

    #[error("reply item {index} is missing text or text_plural")]
    MissingPluralField { index: usize },
}

/// One element of the backend reply, as received.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReplyItem {
    pub id: Option<serde_json::Value>,
    pub text: Option<String>,
    pub text_plural: Option<String>,
}

/// A reply item that passed validation against its entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedTranslation {
    Singular(String),
    Plural { singular: String, plural: String },
}

static LIST_REGEX: OnceLock<Regex> = OnceLock::new();

/// Greedy span from the first `[` to the last `]`, across newlines.
pub fn extract_json_list(raw_reply: &str) -> Option<&str> {
    let regex = LIST_REGEX.get_or_init(|| Regex::new(r"(?s)\[.+\]").unwrap());
    regex.find(raw_reply).map(|m| m.as_str())
}

fn id_matches(id: &serde_json::Value, index: usize) -> bool {
    id.as_f64() == Some(index as f64)
}

/// Validate a raw reply against a batch without touching the entries.
pub fn parse_reply(
    raw_reply: &str,
    batch: &[&mut TranslationEntry],
) -> Result<Vec<ValidatedTranslation>, ReplyError> {
    let list = extract_json_list(raw_reply).ok_or(ReplyError::Unparseable)?;

    let items: Vec<ReplyItem> =
        serde_json::from_str(list).map_err(|e| ReplyError::Malformed(e.to_string()))?;

    if items.len() != batch.len() {
        return Err(ReplyError::LengthMismatch {
            expected: batch.len(),
            actual: items.len(),
        });
    }

    items
        .into_iter()
        .zip(batch.iter())
        .enumerate()
        .map(|(index, (item, entry))| {
            let id = item.id.ok_or(ReplyError::MissingId { index })?;
            if !id_matches(&id, index) {
                return Err(ReplyError::OrderMismatch {
                    index,
                    found: id.to_string(),
                });
            }

            if entry.is_plural() {
                match (item.text, item.text_plural) {
                    (Some(singular), Some(plural)) => {
                        Ok(ValidatedTranslation::Plural { singular, plural })
                    }
                    _ => Err(ReplyError::MissingPluralField { index }),
                }
            } else {
                item.text
                    .map(ValidatedTranslation::Singular)
                    .ok_or(ReplyError::MissingTextField { index })
            }
        })
        .collect()
}

/// Validate a reply and, only if every item is valid, write it onto the batch.
pub fn apply_reply(raw_reply: &str, batch: &mut [&mut TranslationEntry]) -> Result<(), ReplyError> {
    let translations = parse_reply(raw_reply, batch)?;

    for (entry, translation) in batch.iter_mut().zip(translations) {
        match translation {
            ValidatedTranslation::Singular(text) => {
                entry.singular_translated_text = text;
            }
            ValidatedTranslation::Plural { singular, plural } => {
                let forms = entry.plural_translated_texts.get_or_insert_with(Default::default);
                forms.insert("0".to_string(), singular.clone());
                forms.insert("1".to_string(), plural);
                entry.singular_translated_text = singular;
            }
        }
        entry.is_fuzzy = false;
        entry.formally_untranslated = false;
    }

    Ok(())
}
