//! Translation entries and documents.
//!
//! A `TranslationDocument` is the in-memory form of one localization file.
//! Entries are mutated in place when a translation is accepted and written
//! back by the catalog sink.

use std::collections::BTreeMap;

/// A single localizable unit, singular or singular + plural.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationEntry {
    /// Message context (gettext `msgctxt`), used as the key of JSON map output
    pub context: Option<String>,

    /// Source text of the singular form
    pub singular_source_text: String,

    /// Source text of the plural form, present iff the entry is plural
    pub plural_source_text: Option<String>,

    /// Translated singular text, empty if untranslated
    pub singular_translated_text: String,

    /// Translated plural forms keyed by plural index ("0", "1", ...), present iff plural
    pub plural_translated_texts: Option<BTreeMap<String, String>>,

    /// Marked as needing review
    pub is_fuzzy: bool,

    /// The source catalog itself considers this entry untranslated
    pub formally_untranslated: bool,
}

impl TranslationEntry {
    /// Create an untranslated singular entry.
    pub fn singular(source: impl Into<String>) -> Self {
        Self {
            singular_source_text: source.into(),
            formally_untranslated: true,
            ..Self::default()
        }
    }

    /// Create an untranslated plural entry.
    pub fn plural(source: impl Into<String>, source_plural: impl Into<String>) -> Self {
        Self {
            singular_source_text: source.into(),
            plural_source_text: Some(source_plural.into()),
            plural_translated_texts: Some(BTreeMap::new()),
            formally_untranslated: true,
            ..Self::default()
        }
    }

    /// Attach a message context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set an existing translation (plural entries also get plural form "0").
    pub fn with_translation(mut self, translated: impl Into<String>) -> Self {
        let translated = translated.into();
        if let Some(forms) = self.plural_translated_texts.as_mut() {
            forms.insert("0".to_string(), translated.clone());
        }
        self.formally_untranslated = translated.is_empty();
        self.singular_translated_text = translated;
        self
    }

    /// Mark the entry fuzzy.
    pub fn fuzzy(mut self) -> Self {
        self.is_fuzzy = true;
        self
    }

    pub fn is_plural(&self) -> bool {
        self.plural_source_text.is_some()
    }

    /// True if there is no translated text or the catalog lists it as untranslated.
    pub fn is_untranslated(&self) -> bool {
        self.singular_translated_text.is_empty() || self.formally_untranslated
    }

    /// Eligibility rule of the entry selector.
    pub fn needs_translation(&self) -> bool {
        self.is_untranslated() || self.singular_translated_text.is_empty() || self.is_fuzzy
    }
}

/// Ordered collection of entries representing one localization file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationDocument {
    pub entries: Vec<TranslationEntry>,
}

impl TranslationDocument {
    pub fn new(entries: Vec<TranslationEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Select the entries that need translation, preserving document order.
    pub fn select_for_translation(&mut self) -> Vec<&mut TranslationEntry> {
        select_entries(&mut self.entries)
    }
}

/// Entry selector: every untranslated, empty or fuzzy entry, in order.
///
/// Returns an empty vector when nothing qualifies; callers treat that as
/// zero work rather than a failure.
pub fn select_entries(entries: &mut [TranslationEntry]) -> Vec<&mut TranslationEntry> {
    entries
        .iter_mut()
        .filter(|entry| entry.needs_translation())
        .collect()
}
