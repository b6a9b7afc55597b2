//! Integration tests for po-autotranslate
//!
//! These tests run whole catalogs through the pipeline against a mocked
//! chat-completions endpoint.

use polib::message::MessageView;
use polib::po_file;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

use po_autotranslate::{
    metrics::TranslationMetrics,
    openai::OpenAiBackend,
    pipeline::{run_documents, DocumentJob, JobOptions, OutputFormat, PipelineSettings},
    planner::Planner,
    retry::RetryConfig,
};

// ==================== Test Helpers ====================

fn po_header(language: &str) -> String {
    format!(
        r#"msgid ""
msgstr ""
"Project-Id-Version: demo 1.0\n"
"POT-Creation-Date: 2024-01-01 00:00+0000\n"
"PO-Revision-Date: 2024-01-02 00:00+0000\n"
"Language-Team: none\n"
"MIME-Version: 1.0\n"
"Content-Type: text/plain; charset=UTF-8\n"
"Content-Transfer-Encoding: 8bit\n"
"Language: {}\n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"
"#,
        language
    )
}

fn write_catalog(dir: &Path, name: &str, language: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("{}{}", po_header(language), body)).expect("Failed to write catalog");
    path
}

fn numbered_body(count: usize) -> String {
    (0..count)
        .map(|i| format!("\nmsgid \"Message {}\"\nmsgstr \"\"\n", i))
        .collect()
}

/// Answer a chat request by echoing every payload item with a `tr:` prefix
fn echo_reply(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).expect("Request should be JSON");
    let prompt = body["messages"][0]["content"].as_str().expect("Prompt should be a string");
    let payload = prompt.rsplit("\n\n").next().unwrap_or("[]");
    let items: Vec<Value> = serde_json::from_str(payload).expect("Payload should be a JSON list");

    let reply: Vec<Value> = items
        .iter()
        .map(|item| {
            let mut out = json!({
                "id": item["id"],
                "text": format!("tr:{}", item["text"].as_str().unwrap_or_default()),
            });
            if let Some(plural) = item.get("text_plural").and_then(Value::as_str) {
                out["text_plural"] = json!(format!("tr:{}", plural));
            }
            out
        })
        .collect();

    let content = format!(
        "Here are the translations:\n{}",
        serde_json::to_string_pretty(&reply).unwrap()
    );
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

fn backend(server: &MockServer) -> OpenAiBackend {
    OpenAiBackend::new(
        reqwest::Client::new(),
        format!("{}/v1/chat/completions", server.uri()),
        "test-openai-key",
        "gpt-4",
    )
}

fn settings(max_batch_size: usize) -> PipelineSettings {
    PipelineSettings {
        max_batch_size,
        concurrency: 2,
        document_retry: RetryConfig::document(3, Duration::ZERO),
    }
}

fn options(output_dir: Option<PathBuf>, format: OutputFormat) -> JobOptions {
    JobOptions {
        language: None,
        language_name: None,
        languages: Vec::new(),
        output_dir,
        format,
    }
}

async fn plan_all(files: Vec<PathBuf>, options: &JobOptions) -> Vec<DocumentJob> {
    let mut jobs = Vec::new();
    for file in files {
        if let Some(job) = DocumentJob::plan(file, options).await.expect("Should plan job") {
            jobs.push(job);
        }
    }
    jobs
}

async fn mount_echo(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-openai-key"))
        .respond_with(echo_reply)
        .mount(server)
        .await;
}

// ==================== End-to-end Tests ====================

#[tokio::test]
async fn test_translates_catalogs_in_place() {
    let server = MockServer::start().await;
    mount_echo(&server).await;

    let dir = TempDir::new().unwrap();
    let fr = write_catalog(
        dir.path(),
        "fr.po",
        "fr",
        r#"
msgid "Hello"
msgstr ""

#, fuzzy
msgid "Save"
msgstr "Sauver"

msgid "Cancel"
msgstr "Annuler"
"#,
    );
    let de = write_catalog(
        dir.path(),
        "de.po",
        "de",
        r#"
msgid "One file"
msgid_plural "%d files"
msgstr[0] ""
msgstr[1] ""
"#,
    );

    let jobs = plan_all(vec![fr.clone(), de.clone()], &options(None, OutputFormat::Po)).await;
    assert_eq!(jobs[0].language.label(), "fr-French");
    assert_eq!(jobs[1].language.label(), "de-German");

    let planner = Planner::new(backend(&server)).with_backoff(Duration::ZERO);
    let outcomes = run_documents(&planner, jobs, &settings(100)).await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let fr_catalog = po_file::parse(&fr).unwrap();
    let fr_messages: Vec<&dyn MessageView> = fr_catalog.messages().collect();
    assert_eq!(fr_messages[0].msgstr().unwrap(), "tr:Hello");
    assert_eq!(fr_messages[1].msgstr().unwrap(), "tr:Save");
    assert!(!fr_messages[1].is_fuzzy());
    assert_eq!(fr_messages[2].msgstr().unwrap(), "Annuler");

    let de_catalog = po_file::parse(&de).unwrap();
    let de_message = de_catalog.messages().next().unwrap();
    assert_eq!(
        de_message.msgstr_plural().unwrap(),
        &vec!["tr:One file".to_string(), "tr:%d files".to_string()]
    );

    // One request per catalog, both prompts name the language label
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let prompts: Vec<String> = requests
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["messages"][0]["content"].as_str().unwrap().to_string()
        })
        .collect();
    assert!(prompts.iter().any(|p| p.contains("translate them to fr-French")));
    assert!(prompts.iter().any(|p| p.contains("translate them to de-German")));
}

#[tokio::test]
async fn test_large_catalog_is_split_into_bounded_requests() {
    let server = MockServer::start().await;
    mount_echo(&server).await;

    let dir = TempDir::new().unwrap();
    let input = write_catalog(dir.path(), "es.po", "es", &numbered_body(5));
    let jobs = plan_all(vec![input.clone()], &options(None, OutputFormat::Po)).await;

    let metrics = Arc::new(TranslationMetrics::new());
    let planner = Planner::new(backend(&server))
        .with_backoff(Duration::ZERO)
        .with_metrics(Arc::clone(&metrics));
    let outcomes = run_documents(&planner, jobs, &settings(2)).await;

    let report = outcomes[0].result.as_ref().expect("Should translate");
    assert_eq!(report.selected, 5);
    assert_eq!(report.translated, 5);

    // 5 -> [2] + [3 -> [1] + [2]]
    let sizes: Vec<usize> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            let prompt = body["messages"][0]["content"].as_str().unwrap().to_string();
            let payload = prompt.rsplit("\n\n").next().unwrap().to_string();
            serde_json::from_str::<Vec<Value>>(&payload).unwrap().len()
        })
        .collect();
    assert_eq!(sizes, vec![2, 1, 2]);
    assert_eq!(metrics.api_calls(), 3);
    assert_eq!(metrics.entries_translated(), 5);

    let catalog = po_file::parse(&input).unwrap();
    assert!(catalog
        .messages()
        .all(|m| m.msgstr().unwrap().starts_with("tr:Message")));
}

#[tokio::test]
async fn test_server_error_triggers_document_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_echo(&server).await;

    let dir = TempDir::new().unwrap();
    let input = write_catalog(dir.path(), "it.po", "it", &numbered_body(3));
    let jobs = plan_all(vec![input.clone()], &options(None, OutputFormat::Po)).await;

    let metrics = Arc::new(TranslationMetrics::new());
    let planner = Planner::new(backend(&server))
        .with_backoff(Duration::ZERO)
        .with_metrics(Arc::clone(&metrics));
    let outcomes = run_documents(&planner, jobs, &settings(10)).await;

    assert!(outcomes[0].result.is_ok());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(metrics.api_failures(), 1);
}

#[tokio::test]
async fn test_json_map_output_dir() {
    let server = MockServer::start().await;
    mount_echo(&server).await;

    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().join("arb");
    let input = write_catalog(
        dir.path(),
        "ja.po",
        "ja",
        r#"
msgctxt "menu.open"
msgid "Open"
msgstr ""

msgctxt "menu.close"
msgid "Close"
msgstr "閉じる"
"#,
    );

    let jobs = plan_all(vec![input.clone()], &options(Some(out_dir.clone()), OutputFormat::JsonMap)).await;
    assert_eq!(jobs[0].output, out_dir.join("ja.json"));

    let planner = Planner::new(backend(&server)).with_backoff(Duration::ZERO);
    let outcomes = run_documents(&planner, jobs, &settings(10)).await;
    assert!(outcomes[0].result.is_ok());

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("ja.json")).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({"menu.open": "tr:Open", "menu.close": "閉じる"})
    );

    // The source catalog is left alone
    let source = po_file::parse(&input).unwrap();
    assert_eq!(source.messages().next().unwrap().msgstr().unwrap(), "");
}

#[tokio::test]
async fn test_language_filter_skips_catalogs() {
    let dir = TempDir::new().unwrap();
    let fr = write_catalog(dir.path(), "fr.po", "fr", &numbered_body(1));
    let de = write_catalog(dir.path(), "de.po", "de", &numbered_body(1));

    let mut opts = options(None, OutputFormat::Po);
    opts.languages = vec!["FR".to_string()];
    let jobs = plan_all(vec![fr.clone(), de], &opts).await;

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].input, fr);
}

#[tokio::test]
async fn test_rejected_reply_fails_document_without_writing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "I cannot help with that."}}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = write_catalog(dir.path(), "pt.po", "pt", &numbered_body(2));
    let before = std::fs::read_to_string(&input).unwrap();
    let jobs = plan_all(vec![input.clone()], &options(None, OutputFormat::Po)).await;

    let metrics = Arc::new(TranslationMetrics::new());
    let planner = Planner::new(backend(&server))
        .with_backoff(Duration::ZERO)
        .with_metrics(Arc::clone(&metrics));
    let outcomes = run_documents(&planner, jobs, &settings(10)).await;

    assert!(outcomes[0].result.is_err());
    // One leaf request per document attempt
    assert_eq!(metrics.rejected_replies(), 3);
    assert_eq!(std::fs::read_to_string(&input).unwrap(), before);
}
