//! Target language descriptors and the built-in language name registry.
//!
//! The backend only ever sees a composite label such as `"fr-French"`; the
//! registry exists so that catalogs declaring just a `Language: fr` header
//! still get a human-readable name in the prompt.

use anyhow::{bail, Result};
use std::fmt;
use std::sync::OnceLock;

/// Metadata for a known language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Language code as used in catalog headers (e.g., "fr", "pt_BR")
    pub code: &'static str,

    /// English name of the language (e.g., "French")
    pub name: &'static str,
}

/// Registry of known language names.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily, immutable afterwards)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Look up a language by code, case-insensitively.
    ///
    /// Region variants (`pt_BR`, `zh-Hant`) fall back to their base language
    /// when the full code is not registered.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        let code = code.trim();
        let exact = self
            .languages
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(code));
        if exact.is_some() {
            return exact;
        }

        let base = code.split(['_', '-', '@']).next()?;
        self.languages
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(base))
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    const LANGUAGES: &[(&str, &str)] = &[
        ("ar", "Arabic"),
        ("bg", "Bulgarian"),
        ("ca", "Catalan"),
        ("cs", "Czech"),
        ("da", "Danish"),
        ("de", "German"),
        ("el", "Greek"),
        ("en", "English"),
        ("es", "Spanish"),
        ("et", "Estonian"),
        ("fa", "Persian"),
        ("fi", "Finnish"),
        ("fr", "French"),
        ("he", "Hebrew"),
        ("hi", "Hindi"),
        ("hr", "Croatian"),
        ("hu", "Hungarian"),
        ("id", "Indonesian"),
        ("it", "Italian"),
        ("ja", "Japanese"),
        ("ko", "Korean"),
        ("lt", "Lithuanian"),
        ("lv", "Latvian"),
        ("nb", "Norwegian Bokmål"),
        ("nl", "Dutch"),
        ("pl", "Polish"),
        ("pt", "Portuguese"),
        ("pt_BR", "Portuguese (Brazil)"),
        ("ro", "Romanian"),
        ("ru", "Russian"),
        ("sk", "Slovak"),
        ("sl", "Slovenian"),
        ("sr", "Serbian"),
        ("sv", "Swedish"),
        ("th", "Thai"),
        ("tr", "Turkish"),
        ("uk", "Ukrainian"),
        ("vi", "Vietnamese"),
        ("zh_Hans", "Chinese (Simplified)"),
        ("zh_Hant", "Chinese (Traditional)"),
        ("zh", "Chinese"),
    ];

    LANGUAGES
        .iter()
        .map(|&(code, name)| LanguageConfig { code, name })
        .collect()
}

/// The language a document is translated into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLanguage {
    code: String,
    name: String,
}

impl TargetLanguage {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Build a target language from a code, resolving its name from the registry.
    pub fn from_code(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            bail!("Language code is empty");
        }

        match LanguageRegistry::get().get_by_code(code) {
            Some(config) => Ok(Self::new(code, config.name)),
            None => bail!(
                "Unknown language code: '{}' (pass --language-name to name it explicitly)",
                code
            ),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composite label embedded in the prompt, e.g. `"de-German"`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.code, self.name)
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.code, self.name)
    }
}
