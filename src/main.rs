use anyhow::{bail, Result};
use clap::Parser;
use po_autotranslate::config::Config;
use po_autotranslate::metrics::TranslationMetrics;
use po_autotranslate::openai::OpenAiBackend;
use po_autotranslate::pipeline::{run_documents, DocumentJob, JobOptions, OutputFormat, PipelineSettings};
use po_autotranslate::planner::Planner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Machine-translate the missing and fuzzy messages of gettext catalogs
#[derive(Parser, Debug)]
#[command(name = "po-autotranslate", version, about)]
struct Args {
    /// Catalogs (.po) to translate
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Target language code (default: the catalog's Language header)
    #[arg(long)]
    language: Option<String>,

    /// Target language name used in the prompt (default: looked up from the code)
    #[arg(long)]
    language_name: Option<String>,

    /// Only translate catalogs in these languages
    #[arg(long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Write results here instead of next to the inputs
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Po)]
    format: OutputFormat,

    /// Maximum messages per request (overrides MAX_BATCH_SIZE)
    #[arg(long)]
    max_batch_size: Option<usize>,

    /// Documents translated at the same time (overrides CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("po_autotranslate=info".parse()?),
        )
        .init();

    let mut config = Config::from_env()?;
    config.apply_overrides(args.max_batch_size, args.concurrency);
    config.validate()?;

    let backend = OpenAiBackend::from_config(&config)?;
    info!(
        "Translating {} catalogs with {} (batch size {}, {} at a time)",
        args.files.len(),
        backend.model(),
        config.max_batch_size,
        config.concurrency
    );

    let metrics = Arc::new(TranslationMetrics::new());
    let planner = Planner::new(backend)
        .with_backoff(config.batch_backoff)
        .with_metrics(Arc::clone(&metrics));

    let options = JobOptions {
        language: args.language,
        language_name: args.language_name,
        languages: args.languages,
        output_dir: args.output_dir,
        format: args.format,
    };

    let mut failed = 0;
    let mut jobs = Vec::new();
    for file in args.files {
        match DocumentJob::plan(file, &options).await {
            Ok(Some(job)) => jobs.push(job),
            Ok(None) => {}
            Err(e) => {
                error!("{}", e);
                failed += 1;
            }
        }
    }

    let total = jobs.len() + failed;
    let outcomes = run_documents(&planner, jobs, &PipelineSettings::from_config(&config)).await;
    failed += outcomes.iter().filter(|o| o.result.is_err()).count();

    info!("Run finished: {}", metrics.report().summary());

    if failed > 0 {
        bail!("{} of {} catalogs failed", failed, total);
    }

    info!("All catalogs done");
    Ok(())
}
