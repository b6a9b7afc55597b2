//! Gettext catalogs on disk.
//!
//! `GettextCatalog` keeps the parsed polib catalog next to the
//! `TranslationDocument` built from it, plus the file's original text.
//! Writing back only replaces the `msgstr` and `#,` lines of live messages;
//! translator comments, previous-msgid lines and obsolete entries are
//! re-emitted as they were read, since polib does not keep them.

use crate::model::{TranslationDocument, TranslationEntry};
use anyhow::{Context, Result};
use polib::catalog::Catalog;
use polib::message::{MessageMutView, MessageView};
use polib::po_file;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub struct GettextCatalog {
    catalog: Catalog,
    document: TranslationDocument,
    /// Text the catalog was parsed from, if it came from disk
    source: Option<String>,
}

impl GettextCatalog {
    /// Parse a `.po` file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog = po_file::parse(path)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;

        let mut catalog = Self::from_catalog(catalog);
        catalog.source = Some(source);
        debug!(
            "Loaded {} messages from {}",
            catalog.document.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        let entries = catalog.messages().map(entry_from_message).collect();
        Self {
            catalog,
            document: TranslationDocument::new(entries),
            source: None,
        }
    }

    /// Language code from the catalog's `Language` header, if set.
    pub fn language_code(&self) -> Option<&str> {
        let code = self.catalog.metadata.language.trim();
        if code.is_empty() {
            None
        } else {
            Some(code)
        }
    }

    pub fn document(&self) -> &TranslationDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut TranslationDocument {
        &mut self.document
    }

    /// Fold the document back into the catalog and write it as a `.po` file.
    ///
    /// A catalog loaded from disk is written by patching its original text.
    /// polib's own writer is used when there is no source text, or when the
    /// source's blocks no longer line up with the parsed messages.
    pub fn write_po(&mut self, path: &Path) -> Result<()> {
        self.fold_document()?;
        ensure_parent_dir(path)?;

        let patched = match &self.source {
            Some(source) => {
                let patched = patch_source(source, &self.catalog);
                if patched.is_none() {
                    warn!(
                        "Could not line up {} with its parsed messages, comments and obsolete entries will not be kept",
                        path.display()
                    );
                }
                patched
            }
            None => None,
        };

        match patched {
            Some(text) => fs::write(path, text),
            None => po_file::write(&self.catalog, path),
        }
        .with_context(|| format!("Failed to write catalog {}", path.display()))?;
        Ok(())
    }

    fn fold_document(&mut self) -> Result<()> {
        for (mut message, entry) in self.catalog.messages_mut().zip(&self.document.entries) {
            match &entry.plural_translated_texts {
                Some(forms) => {
                    let msgstr_plural = message
                        .msgstr_plural_mut()
                        .with_context(|| format!("Message {:?} is no longer plural", entry.singular_source_text))?;
                    for (key, text) in forms {
                        // Plural form keys are always numeric indices
                        let Ok(index) = key.parse::<usize>() else {
                            continue;
                        };
                        if msgstr_plural.len() <= index {
                            msgstr_plural.resize(index + 1, String::new());
                        }
                        msgstr_plural[index] = text.clone();
                    }
                }
                None => {
                    message
                        .set_msgstr(entry.singular_translated_text.clone())
                        .with_context(|| format!("Message {:?} is no longer singular", entry.singular_source_text))?;
                }
            }

            if !entry.is_fuzzy {
                message.flags_mut().remove_flag("fuzzy");
            }
        }
        Ok(())
    }
}

/// Re-emit `source` with the `msgstr` and `#,` lines of every live message
/// taken from `catalog`. Returns `None` when the number of message blocks
/// differs from the number of parsed messages (duplicate keys, odd spacing).
fn patch_source(source: &str, catalog: &Catalog) -> Option<String> {
    let blocks = split_blocks(source);
    let live = blocks.iter().filter(|block| is_live_block(block)).count();
    // The first live block is the header
    if live != catalog.count() + 1 {
        return None;
    }

    let mut messages = catalog.messages();
    let mut header_seen = false;
    let mut out: Vec<String> = Vec::new();

    for block in &blocks {
        if !is_live_block(block) {
            out.extend(block.iter().map(|line| line.to_string()));
        } else if !header_seen {
            header_seen = true;
            out.extend(block.iter().map(|line| line.to_string()));
        } else {
            out.extend(patch_block(block, messages.next()?));
        }
    }

    let mut text = out.join("\n");
    text.push('\n');
    Some(text)
}

/// Split into runs of lines separated by empty lines. Separators are kept
/// as their own one-line blocks so the layout survives.
fn split_blocks(source: &str) -> Vec<Vec<&str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in source.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            blocks.push(vec![line]);
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Whether polib turns this block into a message (or the header).
fn is_live_block(block: &[&str]) -> bool {
    block.iter().any(|line| {
        line.starts_with("#. ")
            || line.starts_with("#: ")
            || line.starts_with("#, ")
            || line.starts_with("msg")
            || line.starts_with('"')
    })
}

fn patch_block(block: &[&str], message: &dyn MessageView) -> Vec<String> {
    let mut out = Vec::new();
    let mut flags_written = false;
    let mut msgstr_written = false;
    let mut in_msgstr = false;

    for line in block {
        if line.starts_with("msgstr") {
            in_msgstr = true;
            if !msgstr_written {
                msgstr_written = true;
                out.extend(msgstr_lines(message));
            }
            continue;
        }
        if in_msgstr && line.starts_with('"') {
            continue;
        }
        in_msgstr = false;

        if line.starts_with("#, ") {
            if !flags_written {
                flags_written = true;
                if !message.flags().is_empty() {
                    out.push(format!("#, {}", message.flags()));
                }
            }
            continue;
        }
        out.push(line.to_string());
    }

    if !msgstr_written {
        out.extend(msgstr_lines(message));
    }
    out
}

fn msgstr_lines(message: &dyn MessageView) -> Vec<String> {
    match message.msgstr_plural() {
        Ok(forms) => forms
            .iter()
            .enumerate()
            .flat_map(|(index, text)| field_lines(&format!("msgstr[{}]", index), text))
            .collect(),
        Err(_) => field_lines("msgstr", message.msgstr().unwrap_or_default()),
    }
}

/// A PO field, split after every embedded newline like gettext does.
fn field_lines(keyword: &str, text: &str) -> Vec<String> {
    let escaped = escape_po(text);
    let segments: Vec<&str> = escaped.split_inclusive("\\n").collect();
    if segments.len() <= 1 {
        return vec![format!("{} \"{}\"", keyword, escaped)];
    }

    let mut lines = vec![format!("{} \"\"", keyword)];
    lines.extend(segments.iter().map(|segment| format!("\"{}\"", segment)));
    lines
}

fn escape_po(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn entry_from_message(message: &dyn MessageView) -> TranslationEntry {
    let context = Some(message.msgctxt())
        .filter(|ctx| !ctx.is_empty())
        .map(str::to_string);

    let (plural_source_text, plural_translated_texts, singular_translated_text) =
        match (message.msgid_plural(), message.msgstr_plural()) {
            (Ok(source_plural), Ok(forms)) => {
                let texts: BTreeMap<String, String> = forms
                    .iter()
                    .enumerate()
                    .map(|(index, text)| (index.to_string(), text.clone()))
                    .collect();
                let first = forms.first().cloned().unwrap_or_default();
                (Some(source_plural.to_string()), Some(texts), first)
            }
            _ => (
                None,
                None,
                message.msgstr().unwrap_or_default().to_string(),
            ),
        };

    TranslationEntry {
        context,
        singular_source_text: message.msgid().to_string(),
        plural_source_text,
        singular_translated_text,
        plural_translated_texts,
        is_fuzzy: message.is_fuzzy(),
        formally_untranslated: !message.is_translated(),
    }
}

/// Flat key/value view of a document: msgctxt (or msgid) to translated text.
///
/// Entries with an empty translation are left out.
pub fn to_json_map(document: &TranslationDocument) -> Map<String, Value> {
    document
        .entries
        .iter()
        .filter(|entry| !entry.singular_translated_text.is_empty())
        .map(|entry| {
            let key = entry
                .context
                .clone()
                .unwrap_or_else(|| entry.singular_source_text.clone());
            (key, Value::String(entry.singular_translated_text.clone()))
        })
        .collect()
}

pub fn write_json_map(document: &TranslationDocument, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&to_json_map(document))
        .context("Failed to serialize translations")?;
    ensure_parent_dir(path)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
