//! Placeholder preservation checks for applied translations.
//!
//! A reply that passes shape validation can still drop or mangle format
//! placeholders. These checks only produce warnings; they never reject a
//! reply.

use crate::model::TranslationEntry;
use regex::Regex;
use std::sync::OnceLock;

/// Warnings about a translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_warnings()
    }
}

pub struct PlaceholderValidator;

static PRINTF_REGEX: OnceLock<Regex> = OnceLock::new();
static BRACE_REGEX: OnceLock<Regex> = OnceLock::new();

impl PlaceholderValidator {
    /// Compare the placeholders of a source string and its translation.
    pub fn validate(original: &str, translated: &str) -> ValidationReport {
        let mut report = ValidationReport::new();

        let orig_printf = Self::extract_printf(original);
        let trans_printf = Self::extract_printf(translated);
        if orig_printf != trans_printf {
            report.warnings.push(format!(
                "printf placeholder mismatch: original has {:?}, translation has {:?}",
                orig_printf, trans_printf
            ));
        }

        let orig_braces = Self::extract_braces(original);
        let trans_braces = Self::extract_braces(translated);
        if orig_braces != trans_braces {
            report.warnings.push(format!(
                "Brace placeholder mismatch: original has {:?}, translation has {:?}",
                orig_braces, trans_braces
            ));
        }

        report
    }

    /// Validate every translated form of an entry against its source.
    pub fn validate_entry(entry: &TranslationEntry) -> ValidationReport {
        let mut report =
            Self::validate(&entry.singular_source_text, &entry.singular_translated_text);

        if let (Some(source_plural), Some(forms)) =
            (&entry.plural_source_text, &entry.plural_translated_texts)
        {
            if let Some(translated_plural) = forms.get("1") {
                report
                    .warnings
                    .extend(Self::validate(source_plural, translated_plural).warnings);
            }
        }

        report
    }

    /// Extract printf-style conversions (`%s`, `%d`, `%1$s`, `%.2f`), sorted.
    ///
    /// `%%` is a literal percent sign and is skipped.
    fn extract_printf(text: &str) -> Vec<String> {
        let regex = PRINTF_REGEX.get_or_init(|| {
            Regex::new(r"%%|%(?:\d+\$)?[-+ 0#]*(?:\d+|\*)?(?:\.\d+)?(?:hh|h|ll|l|L|z|j|t)?[diouxXeEfFgGcsp@]")
                .unwrap()
        });

        let mut found: Vec<String> = regex
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|m| *m != "%%")
            .map(str::to_string)
            .collect();
        found.sort();
        found
    }

    /// Extract brace placeholders (`{name}`, `{0}`), sorted.
    fn extract_braces(text: &str) -> Vec<String> {
        let regex =
            BRACE_REGEX.get_or_init(|| Regex::new(r"\{[A-Za-z0-9_]*\}").unwrap());

        let mut found: Vec<String> = regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        found.sort();
        found
    }
}
