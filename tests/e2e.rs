//! End-to-end integration tests for edgequake-webrag.
//!
//! The HTTP clients, the paginator and the assistant run for real against a
//! local axum server that plays Firecrawl, ColiVara and the screenshot host.
//! Only the answer model is replaced by a recording engine.
//!
//! Tests that call the live services are gated behind `E2E_ENABLED`.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Live services:
//!   E2E_ENABLED=1 cargo test --test e2e live_ -- --nocapture

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_webrag::{
    create_pdf_from_screenshot, AnswerStream, Assistant, AssistantConfig, ColivaraClient, ErrorCategory,
    EngineFactory, FirecrawlClient, Language, QueryEngine, RetrievalClient, ScrapeClient,
    ScrapeRequest, SourceDocument, WebRagError,
};
use futures::stream;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Mock services ────────────────────────────────────────────────────────────

struct MockState {
    base: String,
    collections: Mutex<HashSet<String>>,
    scrapes: Mutex<Vec<Value>>,
    upserts: Mutex<Vec<(String, usize)>>,
}

async fn spawn_mock() -> Arc<MockState> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let state = Arc::new(MockState {
        base: format!("http://{}", listener.local_addr().unwrap()),
        collections: Mutex::new(HashSet::new()),
        scrapes: Mutex::new(Vec::new()),
        upserts: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/shot/:height", get(serve_screenshot))
        .route("/v1/scrape", post(scrape))
        .route("/v1/collections/", post(create_collection))
        .route("/v1/documents/upsert-document/", post(upsert_document))
        .route("/v1/search/", post(search))
        .with_state(Arc::clone(&state));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    state
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

async fn serve_screenshot(UrlPath(height): UrlPath<u32>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], png(24, height))
}

/// `noshot` in the URL: no screenshot. `broken`: screenshot URL 404s.
/// `refused`: `success: false` without an `error` field.
async fn scrape(State(st): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    st.scrapes.lock().unwrap().push(body.clone());
    let url = body["url"].as_str().unwrap_or_default();
    if url.contains("noshot") {
        return Json(json!({ "success": true, "data": { "markdown": "# page" } }));
    }
    if url.contains("refused") {
        let screenshot = format!("{}/shot/905", st.base);
        return Json(json!({ "success": false, "data": { "screenshot": screenshot } }));
    }
    let screenshot = if url.contains("broken") {
        format!("{}/missing.png", st.base)
    } else {
        format!("{}/shot/905", st.base)
    };
    Json(json!({ "success": true, "data": { "screenshot": screenshot } }))
}

async fn create_collection(
    State(st): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    assert_eq!(body["metadata"]["description"], "Webpage/PDF content");
    if st.collections.lock().unwrap().insert(name.clone()) {
        (StatusCode::CREATED, Json(json!({ "name": name })))
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({ "detail": "collection already exists" })),
        )
    }
}

async fn upsert_document(
    State(st): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let collection = body["collection_name"].as_str().unwrap_or_default().to_string();
    if !st.collections.lock().unwrap().contains(&collection) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "no such collection" })),
        );
    }
    assert_eq!(body["name"], "document");
    assert_eq!(body["wait"], true);
    let pdf = STANDARD
        .decode(body["base64"].as_str().unwrap_or_default())
        .unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    st.upserts.lock().unwrap().push((collection, pdf.len()));
    (StatusCode::CREATED, Json(json!({ "status": "done" })))
}

async fn search(Json(body): Json<Value>) -> Json<Value> {
    let top_k = body["top_k"].as_u64().unwrap_or(3) as usize;
    let results: Vec<Value> = (1..=top_k)
        .map(|page| {
            json!({
                "collection_name": body["collection_name"],
                "document_name": "document",
                "page_number": page,
                "raw_score": 10.0,
                "normalized_score": 1.0 / page as f64,
                "img_base64": format!("data:image/png;base64,{}", STANDARD.encode(png(4, 4))),
            })
        })
        .collect();
    Json(json!({ "query": body["query"], "results": results }))
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config_for(st: &MockState, work_dir: &Path) -> AssistantConfig {
    AssistantConfig::builder()
        .work_dir(work_dir)
        .firecrawl_base_url(st.base.as_str())
        .colivara_base_url(st.base.as_str())
        .firecrawl_api_key("fc-test")
        .colivara_api_key("cv-test")
        .scrape_wait_ms(250)
        .download_timeout_secs(5)
        .api_timeout_secs(5)
        .build()
        .unwrap()
}

fn page_heights(path: &Path) -> Vec<i64> {
    let doc = lopdf::Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let media_box = doc
                .get_dictionary(*id)
                .unwrap()
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap();
            media_box[3].as_i64().unwrap()
        })
        .collect()
}

/// Engine that records prompts and answers with a canned, repetitive text.
#[derive(Default)]
struct RecordingEngine {
    prompts: Mutex<Vec<String>>,
}

impl QueryEngine for RecordingEngine {
    fn query(&self, prompt: &str) -> AnswerStream {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let fragments = vec!["The page is blue.\n", "\n", "The page is blue.\n", "It has 10 pages."];
        Box::pin(stream::iter(
            fragments.into_iter().map(|f| Ok::<_, WebRagError>(f.to_string())),
        ))
    }
}

#[derive(Default)]
struct RecordingFactory {
    collections: Mutex<Vec<String>>,
    engine: Arc<RecordingEngine>,
}

impl EngineFactory for RecordingFactory {
    fn build(&self, _: Arc<dyn RetrievalClient>, collection_name: &str) -> Arc<dyn QueryEngine> {
        self.collections
            .lock()
            .unwrap()
            .push(collection_name.to_string());
        Arc::clone(&self.engine) as Arc<dyn QueryEngine>
    }
}

fn assistant_for(config: AssistantConfig, factory: Arc<RecordingFactory>) -> Assistant {
    let scraper = Arc::new(FirecrawlClient::new(&config).unwrap());
    let retrieval = Arc::new(ColivaraClient::new(&config).unwrap());
    Assistant::with_collaborators(config, scraper, retrieval, factory)
}

// ── Paginator ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_paginate_1000px_screenshot() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&st, dir.path());

    let pdf = create_pdf_from_screenshot(&format!("{}/shot/1000", st.base), &config)
        .await
        .expect("pagination should succeed");

    assert_eq!(pdf.path, dir.path().join("screenshot_slices.pdf"));
    assert_eq!((pdf.width, pdf.height, pdf.slice_height), (24, 1000, 100));
    assert_eq!(page_heights(&pdf.path), vec![100; 10]);
}

#[tokio::test]
async fn test_paginate_905px_screenshot() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&st, dir.path());

    let pdf = create_pdf_from_screenshot(&format!("{}/shot/905", st.base), &config)
        .await
        .unwrap();

    let mut expected = vec![91; 9];
    expected.push(86);
    assert_eq!(page_heights(&pdf.path), expected);
}

#[tokio::test]
async fn test_paginate_overwrites_previous_pdf() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&st, dir.path());

    create_pdf_from_screenshot(&format!("{}/shot/1000", st.base), &config)
        .await
        .unwrap();
    let pdf = create_pdf_from_screenshot(&format!("{}/shot/30", st.base), &config)
        .await
        .unwrap();

    assert_eq!(page_heights(&pdf.path), vec![3; 10]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_screenshot_http_error_is_fetch_error() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&st, dir.path());

    let err = create_pdf_from_screenshot(&format!("{}/missing.png", st.base), &config)
        .await
        .unwrap_err();

    assert!(
        matches!(err, WebRagError::ScreenshotDownloadFailed { ref reason, .. } if reason.contains("404")),
        "got {err:?}"
    );
    assert!(!dir.path().join("screenshot_slices.pdf").exists());
}

// ── Collaborator clients ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_firecrawl_client_requests_full_page_screenshot() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let client = FirecrawlClient::new(&config_for(&st, dir.path())).unwrap();

    let shot = client
        .screenshot(&ScrapeRequest::full_page_screenshot("https://example.com", 250))
        .await
        .unwrap();
    assert_eq!(shot, Some(format!("{}/shot/905", st.base)));

    let none = client
        .screenshot(&ScrapeRequest::full_page_screenshot("https://noshot.example", 250))
        .await
        .unwrap();
    assert_eq!(none, None);

    let err = client
        .screenshot(&ScrapeRequest::full_page_screenshot("https://refused.example", 250))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Collaborator, "got {err:?}");

    let sent = st.scrapes.lock().unwrap()[0].clone();
    assert_eq!(sent["formats"], json!(["screenshot@fullPage"]));
    assert_eq!(sent["waitFor"], 250);
}

#[tokio::test]
async fn test_colivara_client_round_trip() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let client = ColivaraClient::new(&config_for(&st, dir.path())).unwrap();
    let metadata = json!({ "description": "Webpage/PDF content" });

    client.create_collection("c1", metadata.clone()).await.unwrap();
    // Second create answers 409 and is not an error.
    client.create_collection("c1", metadata).await.unwrap();

    let pdf = dir.path().join("doc.pdf");
    std::fs::write(&pdf, b"%PDF-1.5 minimal").unwrap();
    client.upsert_document("c1", "document", &pdf).await.unwrap();
    assert_eq!(st.upserts.lock().unwrap()[0], ("c1".to_string(), 16));

    let pages = client.search("c1", "what colour?", 2).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page_number, 1);
    assert!((pages[1].score - 0.5).abs() < 1e-9);
    assert_eq!(pages[0].image_payload().1, "image/png");
}

#[tokio::test]
async fn test_colivara_upsert_into_missing_collection_fails() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let client = ColivaraClient::new(&config_for(&st, dir.path())).unwrap();
    let pdf = dir.path().join("doc.pdf");
    std::fs::write(&pdf, b"%PDF").unwrap();

    let err = client
        .upsert_document("nope", "document", &pdf)
        .await
        .unwrap_err();
    assert!(matches!(err, WebRagError::Collaborator { .. }));
    assert!(err.to_string().contains("404"));
}

// ── Assistant ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_process_url_then_chat() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::default());
    let mut assistant = assistant_for(config_for(&st, dir.path()), Arc::clone(&factory));
    let mut session = assistant.start_session();

    let outcome = assistant
        .process(&mut session, SourceDocument::RemoteUrl("https://example.com".into()))
        .await
        .expect("processing should succeed");

    assert!(!outcome.reused_index);
    assert_eq!(page_heights(&outcome.document_path).len(), 10);
    assert_eq!(st.upserts.lock().unwrap().len(), 1);
    assert_eq!(
        *factory.collections.lock().unwrap(),
        vec![format!("webpage_collection{}", session.id())]
    );

    let answer = session
        .ask("What colour is the page?")
        .unwrap()
        .complete(&mut session)
        .await
        .unwrap();
    assert_eq!(answer, "The page is blue.\nIt has 10 pages.");
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn test_process_same_url_reuses_index() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::default());
    let mut assistant = assistant_for(config_for(&st, dir.path()), Arc::clone(&factory));
    let mut session = assistant.start_session();
    let url = SourceDocument::RemoteUrl("https://example.com".into());

    assistant.process(&mut session, url.clone()).await.unwrap();
    let again = assistant.process(&mut session, url).await.unwrap();

    assert!(again.reused_index);
    assert_eq!(st.scrapes.lock().unwrap().len(), 2, "the page is captured again");
    assert_eq!(st.upserts.lock().unwrap().len(), 1, "but not indexed again");
    assert_eq!(factory.collections.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::default());
    let mut assistant = assistant_for(config_for(&st, dir.path()), Arc::clone(&factory));
    let mut alice = assistant.start_session();
    let mut bob = assistant.start_session();
    let url = SourceDocument::RemoteUrl("https://example.com".into());

    assistant.process(&mut alice, url.clone()).await.unwrap();
    let outcome = assistant.process(&mut bob, url).await.unwrap();

    assert!(!outcome.reused_index);
    let upserts = st.upserts.lock().unwrap().clone();
    assert_eq!(upserts.len(), 2);
    assert_ne!(upserts[0].0, upserts[1].0);
    assert_eq!(assistant.cache().len(), 2);

    assistant.end_session(&alice);
    assert_eq!(assistant.cache().len(), 1);
    assert!(bob.is_ready());
}

#[tokio::test]
async fn test_invalid_url_stops_before_network() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let mut assistant = assistant_for(
        config_for(&st, dir.path()),
        Arc::new(RecordingFactory::default()),
    );
    let mut session = assistant.start_session();

    let err = assistant
        .process(&mut session, SourceDocument::RemoteUrl("example.com".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, WebRagError::InvalidUrl { .. }));
    assert!(st.scrapes.lock().unwrap().is_empty());
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_missing_screenshot_and_broken_download() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let mut assistant = assistant_for(
        config_for(&st, dir.path()),
        Arc::new(RecordingFactory::default()),
    );
    let mut session = assistant.start_session();

    let err = assistant
        .process(&mut session, SourceDocument::RemoteUrl("https://noshot.example".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, WebRagError::NoScreenshot { .. }));

    let err = assistant
        .process(&mut session, SourceDocument::RemoteUrl("https://broken.example".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, WebRagError::ScreenshotDownloadFailed { .. }));

    assert!(assistant.cache().is_empty());
    assert!(st.upserts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_reset_and_reattach() {
    let st = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(RecordingFactory::default());
    let mut assistant = assistant_for(config_for(&st, dir.path()), Arc::clone(&factory));
    let mut session = assistant.start_session();
    session.set_language(Language::German);

    let upload = SourceDocument::from_inputs(None, Some((b"%PDF-1.4 upload".to_vec(), "My Report.pdf".into())))
        .unwrap();
    let outcome = assistant.process(&mut session, upload).await.unwrap();
    assert_eq!(outcome.document_path, dir.path().join("uploaded_My_Report.pdf"));

    session.ask("Wer?").unwrap().complete(&mut session).await.unwrap();
    assert_eq!(
        factory.engine.prompts.lock().unwrap()[0],
        "Please respond in German. Wer?"
    );

    session.reset();
    assert!(session.transcript().is_empty());
    assert!(matches!(session.ask("again"), Err(WebRagError::NoDocument)));

    assert!(assistant.attach_cached(&mut session));
    let summary = assistant.summarize(&session).await.unwrap();
    assert!(summary.contains("The page is blue."));
    assert_eq!(st.upserts.lock().unwrap().len(), 1);
}

// ── Live services ────────────────────────────────────────────────────────────

/// Requires E2E_ENABLED=1, FIRECRAWL_API_KEY, COLIVARA_API_KEY and an LLM key.
#[tokio::test]
async fn live_webpage_question() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run live e2e tests");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = edgequake_webrag::AssistantConfigBuilder::from_config(AssistantConfig::from_env())
        .work_dir(dir.path())
        .build()
        .unwrap();
    let mut assistant = Assistant::new(config).expect("credentials should be configured");
    let mut session = assistant.start_session();

    assistant
        .process(&mut session, SourceDocument::RemoteUrl("https://example.com".into()))
        .await
        .expect("live processing should succeed");

    let answer = session
        .ask("What is the main heading of this page?")
        .unwrap()
        .complete(&mut session)
        .await
        .expect("live answer should succeed");
    println!("Answer: {answer}");
    assert!(answer.to_lowercase().contains("example"));

    assistant.end_session(&session);
}
