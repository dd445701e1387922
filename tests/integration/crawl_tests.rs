//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run whole
//! harvests end-to-end against them.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use site_harvest::config::{load_config, prepare, Config, RunInput};
use site_harvest::crawler::{fetch_url, run_crawl, CrawlReport};
use site_harvest::output::{
    FanoutSink, JsonLinesSink, MemorySink, RecordSink, SinkError, SinkResult, SqliteSink,
};
use site_harvest::storage::{RunStatus, SqliteStorage, Storage};
use site_harvest::{AggregatedRecord, ExtractionMethod, HarvestError};
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a one-page PDF showing `text`
fn sample_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Creates a fast test configuration for a mock server
///
/// Limits are set directly, bypassing clamping, so tests do not sleep.
fn create_test_config(server: &MockServer) -> Config {
    let base = format!("{}/", server.uri());
    let mut config = Config::for_target(base.clone());
    config.target.connectivity_urls = vec![base];
    config.crawler.delay = 0.0;
    config.crawler.max_pages = 10;
    config.pdf.delay = 0.0;
    config.pdf.backends = vec!["lopdf".to_string()];
    config.http.page_timeout = 5;
    config.http.connectivity_timeout = 5;
    config.http.pdf_timeout = 5;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

fn pdf_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(sample_pdf(text))
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn harvest(config: Config) -> (Result<CrawlReport, HarvestError>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let result = run_crawl(config, sink.clone(), CancellationToken::new()).await;
    (result, sink)
}

fn record_for<'a>(records: &'a [AggregatedRecord], route: &str) -> &'a AggregatedRecord {
    records
        .iter()
        .find(|r| url::Url::parse(&r.page.url).unwrap().path() == route)
        .unwrap_or_else(|| panic!("no record for {}", route))
}

#[tokio::test]
async fn test_full_crawl_with_pdfs() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        html(
            r#"<title>Home</title>
               <div class="content">Welcome to the refinery</div>
               <a href="/about">About</a>
               <a href="/reports/annual.pdf">Annual report</a>
               <a href="https://other.example/x">Elsewhere</a>"#,
        ),
    )
    .await;
    mount_page(
        &server,
        "/about",
        html(r#"<title>About</title><main>About us</main><a href="/">Home</a>"#),
    )
    .await;
    mount_page(&server, "/reports/annual.pdf", pdf_response("Annual Report 2023")).await;

    let (result, sink) = harvest(create_test_config(&server)).await;
    let report = result.unwrap();

    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.pages_skipped, 0);
    assert_eq!(report.pdfs_processed, 1);
    assert_eq!(report.pdfs_failed, 0);
    assert!(!report.cancelled);

    let records = sink.records();
    assert_eq!(records.len(), 2);

    let home = record_for(&records, "/");
    assert_eq!(home.page.title, "Home");
    assert_eq!(home.page.web_content, "Welcome to the refinery");
    assert_eq!(home.page.external_links, vec!["https://other.example/x"]);
    assert_eq!(home.pdf_count, 1);

    let pdf = &home.pdf_documents[0];
    assert_eq!(pdf.extraction_method, ExtractionMethod::Lopdf);
    assert!(pdf.pdf_text.contains("Annual Report 2023"), "got {:?}", pdf.pdf_text);
    assert!(home.all_text_content.starts_with("Welcome to the refinery"));
    assert!(home.all_text_content.contains("--- PDF CONTENT ---"));

    let about = record_for(&records, "/about");
    assert_eq!(about.page.web_content, "About us");
    assert_eq!(about.pdf_count, 0);
}

#[tokio::test]
async fn test_unreachable_target_aborts_without_records() {
    let server = MockServer::start().await;
    mount_page(&server, "/", ResponseTemplate::new(503)).await;

    let (result, sink) = harvest(create_test_config(&server)).await;

    match result {
        Err(HarvestError::Connectivity { attempted }) => assert_eq!(attempted.len(), 1),
        other => panic!("expected connectivity failure, got {:?}", other),
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_connectivity_requires_content_marker() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("This domain is parked")).await;

    let mut config = create_test_config(&server);
    config.target.content_markers = vec!["refinery".to_string()];

    let (result, sink) = harvest(config).await;
    assert!(matches!(result, Err(HarvestError::Connectivity { .. })));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_derived_connectivity_candidates_fall_back_to_http() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("<p>Refinery home</p>")).await;

    let mut config = create_test_config(&server);
    config.target.connectivity_urls.clear();
    config.target.content_markers = vec!["REFINERY".to_string()];

    let (result, sink) = harvest(config).await;
    assert_eq!(result.unwrap().pages_scraped, 1);
    assert!(sink.records()[0].page.url.starts_with("http://"));
}

#[tokio::test]
async fn test_body_whitespace_collapses() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("<p>Hello   World</p>")).await;

    let (result, sink) = harvest(create_test_config(&server)).await;
    result.unwrap();

    let records = sink.records();
    assert_eq!(records[0].page.web_content, "Hello World");
    assert_eq!(records[0].page.title, "No title");
    assert_eq!(records[0].page.web_content_length, 11);
}

#[tokio::test]
async fn test_oversized_pdf_is_a_failed_document() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/big.pdf">Big</a>"#)).await;
    mount_page(
        &server,
        "/big.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(vec![b'x'; 5000]),
    )
    .await;

    let mut config = create_test_config(&server);
    config.pdf.max_bytes = 1000;

    let (result, sink) = harvest(config).await;
    let report = result.unwrap();
    assert_eq!(report.pdfs_processed, 1);
    assert_eq!(report.pdfs_failed, 1);

    let doc = &sink.records()[0].pdf_documents[0];
    assert_eq!(doc.extraction_method, ExtractionMethod::Failed);
    assert_eq!(doc.pdf_text, "");
    assert!(doc.error.as_deref().unwrap_or("").contains("too large"));
}

#[tokio::test]
async fn test_unreadable_pdf_records_cause() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/broken.pdf">Broken</a>"#)).await;
    mount_page(
        &server,
        "/broken.pdf",
        ResponseTemplate::new(200).set_body_bytes(b"not a pdf at all".to_vec()),
    )
    .await;

    let (result, sink) = harvest(create_test_config(&server)).await;
    result.unwrap();

    let record = &sink.records()[0];
    let doc = &record.pdf_documents[0];
    assert!(doc.is_failed());
    assert!(doc.error.is_some());
    assert_eq!(record.all_text_content, record.page.web_content);
}

#[tokio::test]
async fn test_pdfs_disabled_fetches_none() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html(r#"<a href="/a.pdf">A</a><a href="/b.pdf">B</a>"#)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"\.pdf$"))
        .respond_with(pdf_response("never read"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.extract_pdfs = false;

    let (result, sink) = harvest(config).await;
    assert_eq!(result.unwrap().pdfs_processed, 0);

    let record = &sink.records()[0];
    assert_eq!(record.pdf_count, 0);
    assert!(record.pdf_documents.is_empty());
    assert_eq!(record.page.pdf_links.len(), 2);
}

#[tokio::test]
async fn test_at_most_five_pdfs_per_page() {
    let server = MockServer::start().await;
    let links: String = (1..=7)
        .map(|i| format!(r#"<a href="/docs/report{}.pdf">R{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", html(&links)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/docs/report\d\.pdf$"))
        .respond_with(pdf_response("Quarterly figures"))
        .expect(5)
        .mount(&server)
        .await;

    let (result, sink) = harvest(create_test_config(&server)).await;
    assert_eq!(result.unwrap().pdfs_processed, 5);

    let record = &sink.records()[0];
    assert_eq!(record.page.pdf_links.len(), 7);
    assert_eq!(record.pdf_count, 5);
    let processed: Vec<&str> = record
        .pdf_documents
        .iter()
        .map(|doc| doc.pdf_url.as_str())
        .collect();
    assert!(processed[0].ends_with("/docs/report1.pdf"));
    assert!(processed[4].ends_with("/docs/report5.pdf"));
}

#[tokio::test]
async fn test_discovery_falls_back_to_configured_urls() {
    let server = MockServer::start().await;
    mount_page(&server, "/health", html("ok")).await;
    mount_page(&server, "/landing/", ResponseTemplate::new(404)).await;
    mount_page(&server, "/fallback", html("<p>Fallback page</p>")).await;

    let mut config = create_test_config(&server);
    config.target.base_url = format!("{}/landing/", server.uri());
    config.target.connectivity_urls = vec![format!("{}/health", server.uri())];
    config.target.fallback_urls = vec![format!("{}/fallback", server.uri())];

    let (result, sink) = harvest(config).await;
    assert_eq!(result.unwrap().pages_scraped, 1);
    assert_eq!(sink.records()[0].page.web_content, "Fallback page");
}

#[tokio::test]
async fn test_empty_discovery_is_fatal() {
    let server = MockServer::start().await;
    mount_page(&server, "/health", html("ok")).await;
    mount_page(&server, "/landing/", ResponseTemplate::new(500)).await;

    let mut config = create_test_config(&server);
    config.target.base_url = format!("{}/landing/", server.uri());
    config.target.connectivity_urls = vec![format!("{}/health", server.uri())];

    let (result, sink) = harvest(config).await;
    assert!(matches!(result, Err(HarvestError::NoTargets { .. })));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_discovery_follows_site_relative_links_in_order() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html(r#"<a href="/one">1</a><a href="/two">2</a><a href="/three">3</a>"#),
    )
    .await;
    for route in ["/one", "/two", "/three"] {
        mount_page(&server, route, html(&format!("<p>page {}</p>", route))).await;
    }

    let mut config = create_test_config(&server);
    config.crawler.max_pages = 3;

    let (result, sink) = harvest(config).await;
    assert_eq!(result.unwrap().pages_scraped, 3);

    let paths: Vec<String> = sink
        .records()
        .iter()
        .map(|r| url::Url::parse(&r.page.url).unwrap().path().to_string())
        .collect();
    assert_eq!(paths, vec!["/", "/one", "/two"]);
}

#[tokio::test]
async fn test_fetch_url_falls_back_to_http() {
    let server = MockServer::start().await;
    mount_page(&server, "/page", html("<p>Plain</p>")).await;

    let client = reqwest::Client::new();
    let https_url = server.uri().replacen("http://", "https://", 1) + "/page";
    let result = fetch_url(&client, &https_url, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(result.final_url.scheme(), "http");
    assert!(result.text().contains("Plain"));
}

#[tokio::test]
async fn test_https_start_urls_follow_reachable_protocol() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("ok")).await;
    mount_page(&server, "/page", html("<p>Served over http</p>")).await;

    let https_url = server.uri().replacen("http://", "https://", 1) + "/page";
    let mut config = create_test_config(&server);
    config.target.start_urls = vec![https_url];

    let (result, sink) = harvest(config).await;
    assert_eq!(result.unwrap().pages_scraped, 1);

    let record = &sink.records()[0];
    assert_eq!(record.page.url, format!("{}/page", server.uri()));
    assert_eq!(record.page.web_content, "Served over http");
}

#[tokio::test]
async fn test_fetch_url_surfaces_status_after_fallback() {
    let server = MockServer::start().await;
    mount_page(&server, "/gone", ResponseTemplate::new(410)).await;

    let client = reqwest::Client::new();
    let https_url = server.uri().replacen("http://", "https://", 1) + "/gone";
    let err = fetch_url(&client, &https_url, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(err.url().starts_with("http://"));
    assert!(err.to_string().contains("410"));
}

#[tokio::test]
async fn test_failed_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("ok")).await;
    mount_page(&server, "/good", html("<p>Good</p>")).await;
    mount_page(&server, "/bad", ResponseTemplate::new(500)).await;

    let mut config = create_test_config(&server);
    config.target.start_urls = vec![
        format!("{}/bad", server.uri()),
        format!("{}/good", server.uri()),
    ];

    let (result, sink) = harvest(config).await;
    let report = result.unwrap();
    assert_eq!(report.pages_scraped, 1);
    assert_eq!(report.pages_skipped, 1);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_no_url_is_scraped_twice() {
    let server = MockServer::start().await;
    let links = r##"<a href="/">Home</a><a href="/a">A</a><a href="/a#top">A top</a>
                   <a href="/b">B</a><a href="/A">Upper A</a><a href="/c">C</a>"##;
    for route in ["/", "/a", "/b", "/c", "/A"] {
        mount_page(&server, route, html(links)).await;
    }

    let mut config = create_test_config(&server);
    config.crawler.concurrency = 3;
    config.target.start_urls = vec![format!("{}/", server.uri())];

    let (result, sink) = harvest(config).await;
    let report = result.unwrap();

    let urls: Vec<String> = sink.records().into_iter().map(|r| r.page.url).collect();
    let unique: HashSet<&String> = urls.iter().collect();
    assert_eq!(unique.len(), urls.len(), "duplicates in {:?}", urls);
    assert_eq!(report.pages_scraped as usize, urls.len());
    assert_eq!(urls.len(), 5);
}

#[tokio::test]
async fn test_redirect_onto_in_flight_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("<p>Home</p>")).await;
    mount_page(
        &server,
        "/a",
        html("<p>Page A</p>").set_delay(Duration::from_millis(500)),
    )
    .await;
    mount_page(
        &server,
        "/b",
        ResponseTemplate::new(302).insert_header("location", format!("{}/a", server.uri())),
    )
    .await;

    let mut config = create_test_config(&server);
    config.crawler.concurrency = 2;
    config.target.start_urls = vec![
        format!("{}/a", server.uri()),
        format!("{}/b", server.uri()),
    ];

    let (result, sink) = harvest(config).await;
    let report = result.unwrap();

    let urls: Vec<String> = sink.records().into_iter().map(|r| r.page.url).collect();
    assert_eq!(urls.len(), 1, "duplicates in {:?}", urls);
    assert!(urls[0].ends_with("/a"));
    assert_eq!(report.pages_scraped, 1);
    assert_eq!(report.pages_skipped, 1);
}

#[tokio::test]
async fn test_page_budget_is_respected() {
    let server = MockServer::start().await;
    let links: String = (1..=8).map(|i| format!(r#"<a href="/p{}">P</a>"#, i)).collect();
    mount_page(&server, "/", html(&links)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p\d$"))
        .respond_with(html(&links))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.max_pages = 3;
    config.crawler.concurrency = 4;
    config.target.start_urls = vec![format!("{}/", server.uri())];

    let (result, sink) = harvest(config).await;
    assert_eq!(result.unwrap().pages_scraped, 3);
    assert_eq!(sink.len(), 3);
}

#[tokio::test]
async fn test_cancellation_stops_in_flight_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("ok")).await;
    mount_page(
        &server,
        "/slow",
        html("<p>Too late</p>").set_delay(Duration::from_secs(10)),
    )
    .await;

    let mut config = create_test_config(&server);
    config.http.page_timeout = 30;
    config.target.start_urls = vec![format!("{}/slow", server.uri())];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let sink = Arc::new(MemorySink::new());
    let started = std::time::Instant::now();
    let report = run_crawl(config, sink.clone(), cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.pages_scraped, 0);
    assert!(sink.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

struct RejectingSink;

#[async_trait]
impl RecordSink for RejectingSink {
    async fn push(&self, _record: &AggregatedRecord) -> SinkResult<()> {
        Err(SinkError::Write("dataset unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_sink_failure_fails_the_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("<p>Home</p>")).await;

    let config = create_test_config(&server);
    let result = run_crawl(config, Arc::new(RejectingSink), CancellationToken::new()).await;

    assert!(matches!(result, Err(HarvestError::Sink(_))));
}

#[tokio::test]
async fn test_records_reach_jsonl_and_sqlite() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html(r#"<title>Home</title><p>Front page</p><a href="/r.pdf">Report</a>"#),
    )
    .await;
    mount_page(&server, "/r.pdf", pdf_response("Report body")).await;

    let dir = tempfile::tempdir().unwrap();
    let jsonl_path = dir.path().join("out").join("dataset.jsonl");
    let storage = Arc::new(Mutex::new(
        SqliteStorage::new(&dir.path().join("harvest.db")).unwrap(),
    ));

    let jsonl = Arc::new(JsonLinesSink::create(&jsonl_path).await.unwrap());
    let sqlite = Arc::new(SqliteSink::start_run(Arc::clone(&storage), "hash", &server.uri()).unwrap());
    let fanout = FanoutSink::new(vec![jsonl as Arc<dyn RecordSink>, sqlite.clone()]);

    let report = run_crawl(
        create_test_config(&server),
        Arc::new(fanout),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    sqlite.finish_run(RunStatus::Completed, &report.counts()).unwrap();

    let contents = std::fs::read_to_string(&jsonl_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["title"], "Home");
    assert_eq!(value["pdf_count"], 1);
    assert_eq!(value["pdf_documents"][0]["extraction_method"], "lopdf");
    assert!(value["scraped_at"].is_string());

    let storage = storage.lock().unwrap();
    let run = storage.get_run(sqlite.run_id()).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counts.pages_scraped, 1);
    assert_eq!(storage.count_pages(run.id).unwrap(), 1);
}

#[test]
fn test_max_pages_is_clamped_before_crawl() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[crawler]\nmax-pages = 300\ndelay = 0.5\n\n[target]\nbase-url = \"https://example.com/\""
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.crawler.max_pages, 50);
    assert_eq!(config.crawler.delay, 2.0);
}

#[test]
fn test_run_input_is_clamped_too() {
    let mut config = Config::for_target("https://example.com/");
    let input: RunInput =
        serde_json::from_str(r#"{"max_pages": 300, "delay": 1, "extract_pdfs": false}"#).unwrap();

    input.apply(&mut config).unwrap();
    prepare(&mut config).unwrap();

    assert_eq!(config.crawler.max_pages, 50);
    assert_eq!(config.crawler.delay, 2.0);
    assert!(!config.crawler.extract_pdfs);
}
