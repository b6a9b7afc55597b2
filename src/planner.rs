//! Batch planner: recursive binary splitting with adaptive shrink on failure.
//!
//! An entry list longer than the batch limit is split in two contiguous
//! halves, processed one after the other. A half that fails is retried once,
//! after a backoff pause, with the limit halved; if that retry fails too the
//! error goes to the caller. Entries applied before a failure stay applied.

use crate::language::TargetLanguage;
use crate::metrics::TranslationMetrics;
use crate::model::TranslationEntry;
use crate::openai::{BackendError, ChatBackend};
use crate::reply::{apply_reply, ReplyError};
use crate::requester::request_translation;
use crate::validator::PlaceholderValidator;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Hard cap on split depth.
pub const RECURSION_CEILING: usize = 1000;

/// Default pause before retrying a failed half.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invalid translation reply: {source}")]
    Reply {
        #[source]
        source: ReplyError,
        raw_reply: String,
    },

    #[error("recursion depth {depth} exceeded the ceiling of {ceiling}")]
    DepthExceeded { depth: usize, ceiling: usize },
}

impl TranslateError {
    /// Backend and reply failures are worth another attempt; a blown depth ceiling is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TranslateError::DepthExceeded { .. })
    }
}

/// Entries translated so far out of the entries requested by the top-level call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { done: 0, total }
    }
}

pub struct Planner<B> {
    backend: B,
    backoff: Duration,
    metrics: Arc<TranslationMetrics>,
}

impl<B: ChatBackend> Planner<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            backoff: DEFAULT_BACKOFF,
            metrics: Arc::new(TranslationMetrics::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<TranslationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn metrics(&self) -> &Arc<TranslationMetrics> {
        &self.metrics
    }

    /// Translate `entries` in batches of at most `max_batch_size`.
    ///
    /// Returns the number of entries translated.
    pub async fn translate(
        &self,
        entries: &mut [&mut TranslationEntry],
        language: &TargetLanguage,
        max_batch_size: usize,
    ) -> Result<usize, TranslateError> {
        let mut progress = Progress::new(entries.len());
        self.plan_and_translate(entries, language, max_batch_size, 0, &mut progress)
            .await
    }

    /// One frame of the recursive split.
    ///
    /// `depth` is the caller's depth; this frame runs at `depth + 1`.
    pub fn plan_and_translate<'s, 'e>(
        &'s self,
        entries: &'s mut [&'e mut TranslationEntry],
        language: &'s TargetLanguage,
        max_batch_size: usize,
        depth: usize,
        progress: &'s mut Progress,
    ) -> BoxFuture<'s, Result<usize, TranslateError>> {
        async move {
            let depth = depth + 1;
            if depth > RECURSION_CEILING {
                error!("Recursion depth {} exceeded, giving up", depth);
                return Err(TranslateError::DepthExceeded {
                    depth,
                    ceiling: RECURSION_CEILING,
                });
            }

            if entries.is_empty() {
                return Ok(0);
            }

            if max_batch_size < 1 {
                warn!(
                    "Batch size dropped to zero, skipping {} messages for {}",
                    entries.len(),
                    language
                );
                return Ok(0);
            }

            if entries.len() <= max_batch_size {
                self.translate_leaf(entries, language).await?;
                progress.done += entries.len();
                info!(
                    "Translated {} out of {} messages",
                    progress.done, progress.total
                );
                return Ok(entries.len());
            }

            let split_index = entries.len() / 2;
            let (first, second) = entries.split_at_mut(split_index);

            let mut translated = 0;
            for half in [first, second] {
                let checkpoint = progress.done;
                let attempt = self
                    .plan_and_translate(&mut *half, language, max_batch_size, depth, &mut *progress)
                    .await;

                let count = match attempt {
                    Ok(count) => count,
                    Err(e) if e.is_retryable() => {
                        let retry_batch_size = max_batch_size / 2;
                        error!(
                            batch_size = half.len(),
                            language = %language,
                            "Failed to translate batch: {}. Taking a break before retrying with batch size {}",
                            e,
                            retry_batch_size
                        );
                        // Entries applied by the failed attempt get translated again
                        progress.done = checkpoint;
                        sleep(self.backoff).await;
                        self.plan_and_translate(half, language, retry_batch_size, depth, &mut *progress)
                            .await?
                    }
                    Err(e) => return Err(e),
                };

                translated += count;
            }

            Ok(translated)
        }
        .boxed()
    }

    /// Send one leaf batch and apply the reply.
    async fn translate_leaf(
        &self,
        batch: &mut [&mut TranslationEntry],
        language: &TargetLanguage,
    ) -> Result<(), TranslateError> {
        self.metrics.record_api_call();

        let raw_reply = match request_translation(&self.backend, batch, language).await {
            Ok(reply) => reply,
            Err(e) => {
                self.metrics.record_api_failure();
                error!(
                    batch_size = batch.len(),
                    language = %language,
                    "Translation request failed: {}",
                    e
                );
                return Err(e.into());
            }
        };

        if let Err(source) = apply_reply(&raw_reply, batch) {
            self.metrics.record_rejected_reply();
            error!(
                batch_size = batch.len(),
                language = %language,
                "Rejected translation reply ({}): {}",
                source,
                raw_reply
            );
            return Err(TranslateError::Reply { source, raw_reply });
        }

        self.metrics.record_entries_translated(batch.len());

        for entry in batch.iter() {
            let report = PlaceholderValidator::validate_entry(entry);
            if report.has_warnings() {
                warn!(
                    "Placeholder warnings for {:?} ({}): {:?}",
                    entry.singular_source_text, language, report.warnings
                );
            }
        }

        info!("Batch of {} messages translated successfully", batch.len());
        Ok(())
    }
}
