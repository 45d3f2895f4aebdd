//! Integration tests for extraction and job orchestration
//!
//! These tests use wiremock to create mock HTTP servers and run full
//! extractions end-to-end into temporary output directories.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::bulk::{parse_bulk_csv, AuthBlock, BulkSpec};
use sumi_harvest::config::Config;
use sumi_harvest::crawler::{
    preview_page, AuthConfig, Coordinator, CrawlMode, CrawlRequest, ErrorKind, Extractor,
    ImageDownloader, OutputFormat,
};
use sumi_harvest::extract::ScopeSelector;
use sumi_harvest::state::{CrawlOutcome, JobStatus};
use sumi_harvest::storage::{JobStorage, JsonJobStore};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<html>
<head><title>Field Notes</title></head>
<body>
  <nav class="menu"><a href="/home">Home</a></nav>
  <div class="content">
    <h1>Field Notes</h1>
    <p>Hello <b>world</b>, from the field.</p>
    <ul><li>First</li><li>Second</li></ul>
  </div>
</body>
</html>"#;

/// Creates a test configuration writing under `dir`
fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.output_directory = dir.join("output").display().to_string();
    config.output.job_history_path = dir.join("jobs.json").display().to_string();
    config.fetcher.timeout_secs = 5;
    config.fetcher.max_retries = 3;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn png(size: usize) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "image/png")
        .set_body_bytes(vec![0x89u8; size])
}

fn read(folder: &str, file: &str) -> String {
    std::fs::read_to_string(Path::new(folder).join(file)).expect("Failed to read output file")
}

#[tokio::test]
async fn test_content_extraction_writes_all_formats() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(html(ARTICLE))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let mut request = CrawlRequest::new(format!("{}/notes", mock_server.uri()));
    request.formats = vec![OutputFormat::Txt, OutputFormat::Md, OutputFormat::Html];
    request.scope = ScopeSelector::new(Some("content".to_string()), None);

    let outcome = extractor.extract(&request, None).await;
    let success = outcome.as_success().expect("extraction should succeed");

    assert_eq!(success.mode, CrawlMode::Content);
    assert_eq!(success.output_files.len(), 3);
    assert!(success.output_files[0].ends_with(".txt"));
    assert!(success.output_files[1].ends_with(".md"));
    assert!(success.output_files[2].ends_with(".html"));

    let text = read(&success.output_folder, &success.output_files[0]);
    assert!(text.contains("Hello world"));
    assert!(text.contains("First\nSecond"));
    assert!(!text.contains("Home"));

    let markdown = read(&success.output_folder, &success.output_files[1]);
    assert!(markdown.contains("# Field Notes"));
    assert!(markdown.contains("**world**"));

    let page = read(&success.output_folder, &success.output_files[2]);
    assert!(page.contains("<title>Field Notes</title>"));

    let folder = Path::new(&success.output_folder);
    assert!(folder.join("extraction_details.json").exists());
    assert!(folder.join("extraction_summary.txt").exists());

    let details: serde_json::Value =
        serde_json::from_str(&read(&success.output_folder, "extraction_details.json")).unwrap();
    assert_eq!(details["http_response"]["status_code"], 200);
    assert_eq!(details["extraction_parameters"]["mode"], "content");
}

#[tokio::test]
async fn test_link_extraction_to_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/links"))
        .respond_with(html(
            r##"<body>
                <a href="/about">About</a>
                <a href="https://elsewhere.example/x">Out</a>
                <a href="#top">Top</a>
                <a href="mailto:me@example.com">Mail</a>
            </body>"##,
        ))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let mut request = CrawlRequest::new(format!("{}/links", mock_server.uri()));
    request.mode = CrawlMode::Link;
    request.formats = vec![OutputFormat::Json];
    request.exclude_anchors = true;

    let outcome = extractor.extract(&request, Some(4)).await;
    let success = outcome.as_success().expect("extraction should succeed");

    let folder_name = Path::new(&success.output_folder)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(folder_name.starts_with("004_"));

    let links: serde_json::Value =
        serde_json::from_str(&read(&success.output_folder, &success.output_files[0])).unwrap();
    let links = links.as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["url"], format!("{}/about", mock_server.uri()));
    assert_eq!(links[0]["type"], "internal");
    assert_eq!(links[1]["type"], "external");
}

#[tokio::test]
async fn test_scope_failure_saves_debug_html() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(html(ARTICLE))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let mut request = CrawlRequest::new(format!("{}/notes", mock_server.uri()));
    request.scope = ScopeSelector::new(Some("article-body".to_string()), None);

    let outcome = extractor.extract(&request, None).await;
    let failure = outcome.as_failure().expect("extraction should fail");

    assert_eq!(failure.error_type, ErrorKind::ContentError);
    assert_eq!(failure.error_code, "ELEMENT_NOT_FOUND");
    assert!(failure.reason.contains("Authentication successful"));
    assert!(failure
        .reason
        .ends_with("Debug: fetched HTML saved to debug_fetched.html for inspection"));

    let diagnostics = failure.diagnostics.as_ref().unwrap();
    assert!(diagnostics.available_classes.contains(&"content".to_string()));
    assert!(diagnostics.available_classes.contains(&"menu".to_string()));

    let folder = Path::new(failure.output_folder.as_ref().unwrap());
    assert_eq!(
        std::fs::read_to_string(folder.join("debug_fetched.html")).unwrap(),
        ARTICLE
    );
    assert!(folder.join("extraction_details.json").exists());
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let request = CrawlRequest::new(format!("{}/missing", mock_server.uri()));
    let outcome = extractor.extract(&request, None).await;
    let failure = outcome.as_failure().unwrap();

    assert_eq!(failure.error_type, ErrorKind::HttpError);
    assert_eq!(failure.error_code, "404");
    assert_eq!(failure.reason, "404 Not Found");
    assert!(!failure.retry_possible);
    assert!(!failure.suggestions.is_empty());
    assert!(failure.debug_html.is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let request = CrawlRequest::new(format!("{}/flaky", mock_server.uri()));
    let outcome = extractor.extract(&request, None).await;
    let failure = outcome.as_failure().unwrap();

    assert_eq!(failure.error_code, "503");
    assert!(failure.retry_possible);
}

#[tokio::test]
async fn test_empty_scope_is_content_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(html("<body><div id=\"main\">  <script>var x;</script> </div></body>"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let mut request = CrawlRequest::new(format!("{}/blank", mock_server.uri()));
    request.scope = ScopeSelector::new(None, Some("main".to_string()));

    let outcome = extractor.extract(&request, None).await;
    let failure = outcome.as_failure().unwrap();
    assert_eq!(failure.error_type, ErrorKind::ContentError);
    assert_eq!(failure.error_code, "EMPTY_CONTENT");
}

#[tokio::test]
async fn test_image_name_collisions_and_rewrite() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(html(
            r#"<body><div class="content">
                <p>Two logos</p>
                <img src="/a/logo.png" alt="A">
                <img src="/b/logo.png" alt="B">
                <img src="/a/logo.png" alt="A again">
            </div></body>"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/logo.png"))
        .respond_with(png(64))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b/logo.png"))
        .respond_with(png(32))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path()))).unwrap();

    let mut request = CrawlRequest::new(format!("{}/gallery", mock_server.uri()));
    request.formats = vec![OutputFormat::Md];
    request.scope = ScopeSelector::new(Some("content".to_string()), None);
    request.download_images = true;

    let outcome = extractor.extract(&request, None).await;
    let success = outcome.as_success().expect("extraction should succeed");

    assert!(success.has_images);
    assert!(success.warnings.is_empty());
    assert_eq!(success.output_files[0], "logo.png");
    assert_eq!(success.output_files[1], "logo_1.png");
    assert!(success.output_files[2].ends_with(".md"));

    let folder = Path::new(&success.output_folder);
    assert_eq!(std::fs::metadata(folder.join("logo.png")).unwrap().len(), 64);
    assert_eq!(std::fs::metadata(folder.join("logo_1.png")).unwrap().len(), 32);

    let markdown = read(&success.output_folder, &success.output_files[2]);
    assert!(markdown.contains("![A](logo.png)"));
    assert!(markdown.contains("![B](logo_1.png)"));
    assert!(markdown.contains("![A again](logo.png)"));
}

#[tokio::test]
async fn test_oversized_image_becomes_warning() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(
            r#"<body><p>Big picture</p><img src="big.png"><img src="small.png"></body>"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/big.png"))
        .respond_with(png(4096))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/small.png"))
        .respond_with(png(16))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let images = ImageDownloader::with_limits(Duration::from_secs(5), 1024, "TestBot").unwrap();
    let extractor = Extractor::new(Arc::new(create_test_config(dir.path())))
        .unwrap()
        .with_image_downloader(images);

    let mut request = CrawlRequest::new(format!("{}/page", mock_server.uri()));
    request.download_images = true;

    let outcome = extractor.extract(&request, None).await;
    let success = outcome.as_success().expect("extraction should succeed");

    assert!(success.has_images);
    assert_eq!(success.warnings, vec!["1 images failed to download".to_string()]);
    assert!(success.output_files.contains(&"small.png".to_string()));
    assert!(!Path::new(&success.output_folder).join("big.png").exists());

    let summary = read(&success.output_folder, "extraction_summary.txt");
    assert!(summary.contains("1 images failed to download"));
}

#[tokio::test]
async fn test_row_auth_overrides_global_auth() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("cookie", "session=row"))
        .respond_with(html("<body><p>Row secret</p></body>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/basic"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(html("<body><p>Global secret</p></body>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(10)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(dir.path()));
    let store = Arc::new(JsonJobStore::open(&config.output.job_history_path).unwrap());
    let coordinator = Coordinator::new(Arc::clone(&config), store).unwrap();

    let uri = mock_server.uri();
    let csv = format!(
        "url,auth_enabled,auth_type,cookies\n\
         {uri}/private,yes,cookies,session=row\n\
         {uri}/basic,,,\n\
         {uri}/basic,yes,cookies,session=row\n"
    );
    let spec = BulkSpec {
        rows: parse_bulk_csv(csv.as_bytes()).unwrap(),
        global_auth: Some(AuthBlock::basic("user", "pass")),
        combine_results: false,
        csv_filename: Some("auth.csv".to_string()),
    };

    let (job_id, handle) = coordinator.start_bulk(spec).unwrap();
    let job = handle.await.unwrap().unwrap();

    assert_eq!(job.id(), job_id);
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.completed_urls(), 2);
    assert_eq!(job.failed_urls(), 1);
    assert!(job.results()[0].is_success());
    assert!(job.results()[1].is_success());
    assert_eq!(job.results()[2].as_failure().unwrap().error_code, "401");
}

#[tokio::test]
async fn test_bulk_combine_and_store_reload() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(html("<body><p>First page.</p></body>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(html("<body><p>Second page.</p></body>"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(dir.path()));
    let store = Arc::new(JsonJobStore::open(&config.output.job_history_path).unwrap());
    let coordinator = Coordinator::new(Arc::clone(&config), store).unwrap();

    let uri = mock_server.uri();
    let csv = format!("url,format\n{uri}/one,\"txt,md\"\n{uri}/two,txt\nnot a url,txt\n");
    let mut spec = BulkSpec::new(parse_bulk_csv(csv.as_bytes()).unwrap());
    spec.combine_results = true;

    let (job_id, handle) = coordinator.start_bulk(spec).unwrap();
    let job = handle.await.unwrap().unwrap();

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.total_urls(), 3);
    assert_eq!(job.completed_urls(), 2);
    assert_eq!(job.failed_urls(), 1);
    assert_eq!(job.results().len(), 4);

    let CrawlOutcome::Combined(combined) = &job.results()[3] else {
        panic!("last result should be the combined output");
    };
    assert_eq!(combined.label, "Combined Results (2 URLs)");
    assert_eq!(combined.urls_combined, 2);

    let first = job.results()[0].as_success().unwrap();
    let second = job.results()[1].as_success().unwrap();
    let combined_txt = combined
        .output_files
        .iter()
        .find(|f| f.ends_with(".txt"))
        .unwrap();
    assert_eq!(
        read(&combined.output_folder, combined_txt),
        format!(
            "{}{}",
            read(&first.output_folder, &first.output_files[0]),
            read(&second.output_folder, &second.output_files[0])
        )
    );

    let reloaded = JsonJobStore::open(&config.output.job_history_path).unwrap();
    let stored = reloaded.get_job(&job_id).unwrap().unwrap();
    assert_eq!(stored.status(), JobStatus::Completed);
    assert_eq!(stored.results().len(), 4);
    assert_eq!(stored.completed_urls(), 2);
    assert!(stored.current_url().is_none());

    assert!(coordinator.delete_job(&job_id).unwrap());
    assert!(!Path::new(&first.output_folder).exists());
    assert!(!Path::new(&combined.output_folder).join(combined_txt).exists());
}

#[tokio::test]
async fn test_repeat_crawls_keep_separate_folders() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(html(ARTICLE))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = Arc::new(create_test_config(dir.path()));
    let store = Arc::new(JsonJobStore::open(&config.output.job_history_path).unwrap());
    let coordinator = Coordinator::new(Arc::clone(&config), store).unwrap();
    let url = format!("{}/notes", mock_server.uri());

    let first = coordinator.crawl_single(CrawlRequest::new(&url)).await.unwrap();
    let second = coordinator.crawl_single(CrawlRequest::new(&url)).await.unwrap();

    let first_folder = first.results()[0].as_success().unwrap().output_folder.clone();
    let second_folder = second.results()[0].as_success().unwrap().output_folder.clone();
    assert_ne!(first_folder, second_folder);

    assert!(coordinator.delete_job(first.id()).unwrap());
    assert!(!Path::new(&first_folder).exists());
    assert!(Path::new(&second_folder).is_dir());
}

#[tokio::test]
async fn test_preview_reports_scope_and_classes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .and(header("cookie", "session=abc"))
        .respond_with(html(ARTICLE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let mut auth = AuthConfig::default();
    auth.cookies.insert("session".to_string(), "abc".to_string());
    let url = format!("{}/notes", mock_server.uri());

    let scope = ScopeSelector::new(Some("content".to_string()), None);
    let preview = preview_page(&config.fetcher, &url, &auth, &scope)
        .await
        .unwrap();

    assert_eq!(preview.status_code, 200);
    assert_eq!(preview.title, "Field Notes");
    assert!(preview.has_scope_element);
    let element = preview.scope_element.as_ref().unwrap();
    assert_eq!(element.tag, "div");
    assert!(element.text_preview.starts_with("Field Notes"));
    let classes: Vec<&str> = preview
        .available_classes
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(classes, vec!["menu", "content"]);
    assert_eq!(preview.statistics.total_links, 1);
    assert_eq!(preview.statistics.total_paragraphs, 1);

    // Nothing is written
    assert!(!dir.path().join("output").exists());
    assert!(!dir.path().join("jobs.json").exists());
}
