//! Document orchestration: load, select, plan, store.
//!
//! Documents are independent. A pool of `concurrency` workers takes them in
//! order, each one running inside its own tracing span so every log line can
//! be attributed to its file and language. Within a document the planner is
//! strictly sequential.

use crate::catalog::{write_json_map, GettextCatalog};
use crate::config::Config;
use crate::language::TargetLanguage;
use crate::openai::ChatBackend;
use crate::planner::{Planner, TranslateError};
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::bail;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Gettext catalog, header and comments preserved
    Po,
    /// Flat JSON object of key to translated text
    JsonMap,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Po => "po",
            OutputFormat::JsonMap => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("failed to translate {}: {source}", .path.display())]
    Translate {
        path: PathBuf,
        #[source]
        source: TranslateError,
    },

    #[error("failed to store {}: {reason}", .path.display())]
    Store { path: PathBuf, reason: String },
}

impl DocumentError {
    /// Only translation failures are worth reloading the document for.
    pub fn is_retryable(&self) -> bool {
        match self {
            DocumentError::Translate { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// How job targets are chosen from the command line.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Language code overriding the catalog header
    pub language: Option<String>,
    /// Display name overriding the registry lookup
    pub language_name: Option<String>,
    /// Only documents whose language is listed here are processed (empty = all)
    pub languages: Vec<String>,
    /// Output directory; defaults to the input's directory
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
}

/// One document to translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub language: TargetLanguage,
}

impl DocumentJob {
    /// Work out the job for `input`, or `None` when the language filter excludes it.
    pub async fn plan(input: PathBuf, options: &JobOptions) -> Result<Option<Self>, DocumentError> {
        let header_code = match &options.language {
            Some(_) => None,
            None => load_catalog(&input)
                .await?
                .language_code()
                .map(str::to_string),
        };

        let language = resolve_language(
            options.language.as_deref().or(header_code.as_deref()),
            options.language_name.as_deref(),
        )
        .map_err(|e| DocumentError::Load {
            path: input.clone(),
            reason: format!("{:#}", e),
        })?;

        if !options.languages.is_empty()
            && !options
                .languages
                .iter()
                .any(|code| code.eq_ignore_ascii_case(language.code()))
        {
            info!(
                "Skipping {} ({} is not in the language filter)",
                input.display(),
                language.code()
            );
            return Ok(None);
        }

        let output = output_path(&input, options.output_dir.as_deref(), options.format);
        Ok(Some(Self {
            input,
            output,
            format: options.format,
            language,
        }))
    }
}

fn resolve_language(code: Option<&str>, name: Option<&str>) -> anyhow::Result<TargetLanguage> {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
        bail!("Catalog has no Language header and no --language was given");
    };

    match name {
        Some(name) => Ok(TargetLanguage::new(code, name)),
        None => TargetLanguage::from_code(code),
    }
}

/// Output file for `input`: same file name with the format's extension,
/// in `output_dir` or next to the input.
pub fn output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let file_name = input.file_name().map(PathBuf::from).unwrap_or_default();
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(file_name).with_extension(format.extension())
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    /// Entries the selector picked
    pub selected: usize,
    /// Entries translated by the planner
    pub translated: usize,
    /// File written, `None` when there was nothing to translate
    pub written: Option<PathBuf>,
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub job: DocumentJob,
    pub result: Result<DocumentReport, DocumentError>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_batch_size: usize,
    pub concurrency: usize,
    pub document_retry: RetryConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            concurrency: config.concurrency,
            document_retry: RetryConfig::document(
                config.document_attempts,
                config.document_retry_pause,
            ),
        }
    }
}

/// Translate every job with at most `settings.concurrency` documents in flight.
///
/// Outcomes come back in job order. A failed document does not stop the others.
pub async fn run_documents<B: ChatBackend>(
    planner: &Planner<B>,
    jobs: Vec<DocumentJob>,
    settings: &PipelineSettings,
) -> Vec<DocumentOutcome> {
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));

    let tasks = jobs.into_iter().map(|job| {
        let semaphore = Arc::clone(&semaphore);
        let span = info_span!(
            "document",
            file = %job.input.display(),
            language = %job.language
        );

        async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire().await.ok();

            let result = translate_document(planner, &job, settings).await;
            match &result {
                Ok(report) if report.written.is_some() => info!(
                    "Done: translated {} of {} selected messages",
                    report.translated, report.selected
                ),
                Ok(_) => info!("Done: no new translations"),
                Err(e) => error!("Document failed: {}", e),
            }

            DocumentOutcome { job, result }
        }
        .instrument(span)
    });

    join_all(tasks).await
}

/// Translate one document, retrying the whole document on retryable failures.
///
/// Every attempt reloads the catalog from disk.
pub async fn translate_document<B: ChatBackend>(
    planner: &Planner<B>,
    job: &DocumentJob,
    settings: &PipelineSettings,
) -> Result<DocumentReport, DocumentError> {
    let operation_name = format!("Translate {}", job.input.display());
    with_retry_if(
        &settings.document_retry,
        &operation_name,
        || attempt_document(planner, job, settings.max_batch_size),
        DocumentError::is_retryable,
    )
    .await
}

async fn attempt_document<B: ChatBackend>(
    planner: &Planner<B>,
    job: &DocumentJob,
    max_batch_size: usize,
) -> Result<DocumentReport, DocumentError> {
    let mut catalog = load_catalog(&job.input).await?;
    let total = catalog.document().len();

    let mut selected = catalog.document_mut().select_for_translation();
    let selected_count = selected.len();
    if selected_count == 0 {
        info!("No messages need translation");
        return Ok(DocumentReport {
            selected: 0,
            translated: 0,
            written: None,
        });
    }

    info!(
        "Translating {} of {} messages to {}",
        selected_count, total, job.language
    );

    let translated = planner
        .translate(&mut selected, &job.language, max_batch_size)
        .await
        .map_err(|source| DocumentError::Translate {
            path: job.input.clone(),
            source,
        })?;

    store(catalog, job).await?;

    Ok(DocumentReport {
        selected: selected_count,
        translated,
        written: Some(job.output.clone()),
    })
}

/// Parse a catalog off the async runtime.
///
/// A panic inside the parser (malformed header) is reported as a load failure.
async fn load_catalog(path: &Path) -> Result<GettextCatalog, DocumentError> {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || GettextCatalog::load(&owned)).await {
        Ok(Ok(catalog)) => Ok(catalog),
        Ok(Err(e)) => Err(DocumentError::Load {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        }),
        Err(e) => Err(DocumentError::Load {
            path: path.to_path_buf(),
            reason: format!("catalog parser aborted: {}", e),
        }),
    }
}

/// Write the document off the async runtime, like `load_catalog` reads it.
async fn store(mut catalog: GettextCatalog, job: &DocumentJob) -> Result<(), DocumentError> {
    let output = job.output.clone();
    let format = job.format;
    let stored = tokio::task::spawn_blocking(move || match format {
        OutputFormat::Po => catalog.write_po(&output),
        OutputFormat::JsonMap => write_json_map(catalog.document(), &output),
    })
    .await;

    let reason = match stored {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{:#}", e)),
        Err(e) => Some(format!("writer aborted: {}", e)),
    };
    if let Some(reason) = reason {
        return Err(DocumentError::Store {
            path: job.output.clone(),
            reason,
        });
    }

    info!("Wrote {}", job.output.display());
    Ok(())
}
