//! Integration tests for the crawl loop.
//!
//! These tests use wiremock to stand up a mock HTTP server and drive a
//! complete crawl through the orchestrator against an in-memory
//! coordination store, exercising the real fetcher/parser pods end to end.

use podcrawl::config::{Config, CrawlerConfig, PodConfig, StoreConfig, UserAgentConfig};
use podcrawl::crawler::Orchestrator;
use podcrawl::store::{visited_record_key, CoordinationStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(data_dir: &str, seed_file: &str, max_pages: u64) -> Config {
    Config {
        crawler: CrawlerConfig {
            data_dir: data_dir.to_string(),
            seed_file: seed_file.to_string(),
            exclude_file: None,
            resume: false,
            seeded_urls_only: false,
            max_pages: Some(max_pages),
            max_duration: Some(20),
            max_workers: 4,
            min_crawl_delay_seconds: 1,
            url_max_length: 2000,
            non_text_extension_blocklist: podcrawl::config::DEFAULT_NON_TEXT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            candidate_check_limit: None,
            bloom_capacity: Some(10_000),
            bloom_fpr: 0.001,
            content_storage: "disabled".to_string(),
            fetch_timeout_seconds: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        store: StoreConfig {
            store_url: String::new(),
        },
        pods: PodConfig {
            fetcher_pods: 1,
            parser_pods: 1,
            fetcher_workers_per_pod: 2,
            parser_workers_per_pod: 2,
        },
    }
}

async fn write_seed_file(dir: &std::path::Path, urls: &[String]) -> std::path::PathBuf {
    let path = dir.join("seeds.txt");
    tokio::fs::write(&path, urls.join("\n")).await.unwrap();
    path
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><body><a href="{base_url}/page1">1</a><a href="{base_url}/page2">2</a></body></html>"#
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    for p in ["/page1", "/page2"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>leaf</body></html>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&mock_server)
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let seed_file = write_seed_file(tmp.path(), &[format!("{base_url}/")]).await;
    let config = test_config(
        tmp.path().join("data").to_str().unwrap(),
        seed_file.to_str().unwrap(),
        3,
    );

    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::with_store(config, store.clone());
    orchestrator.run().await.expect("crawl failed");

    for url in [
        format!("{base_url}/"),
        format!("{base_url}/page1"),
        format!("{base_url}/page2"),
    ] {
        let record = store
            .hash_get_fields(&visited_record_key(&url), &["status_code"])
            .await
            .unwrap();
        assert_eq!(
            record.into_iter().next().flatten(),
            Some("200".to_string()),
            "{url} should have been fetched and recorded as visited"
        );
    }
}

#[tokio::test]
async fn test_robots_txt_disallow_is_never_fetched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    // extract_domain strips the port (see url::domain::test_extract_with_port),
    // so the enforcer looks up robots.txt under the bare host, not host:port —
    // an actual HTTP fetch would hit the real port 80 on this host, not the
    // mock's ephemeral port. Pre-seed the coordination store's robots cache
    // directly instead, the same way a real fetch's result would land there.
    let domain = url::Url::parse(&base_url)
        .unwrap()
        .host_str()
        .unwrap()
        .to_string();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><body><a href="{base_url}/allowed">a</a><a href="{base_url}/admin">b</a></body></html>"#
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/allowed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>ok</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>admin</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .expect(0)
        .mount(&mock_server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let seed_file = write_seed_file(tmp.path(), &[format!("{base_url}/")]).await;
    let config = test_config(
        tmp.path().join("data").to_str().unwrap(),
        seed_file.to_str().unwrap(),
        2,
    );

    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    store
        .set_domain_robots(
            &domain,
            "User-agent: *\nDisallow: /admin",
            chrono::Utc::now().timestamp() + 24 * 60 * 60,
        )
        .await
        .unwrap();

    let orchestrator = Orchestrator::with_store(config, store.clone());
    orchestrator.run().await.expect("crawl failed");

    let admin_record = store
        .hash_get_fields(&visited_record_key(&format!("{base_url}/admin")), &["status_code"])
        .await
        .unwrap();
    assert_eq!(
        admin_record.into_iter().next().flatten(),
        Some("0".to_string()),
        "/admin should be recorded as robots-disallowed (sentinel status 0), never fetched"
    );
}

#[tokio::test]
async fn test_non_textual_content_is_recorded_without_parsing() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><body><a href="{base_url}/report.pdf">pdf</a></body></html>"#
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46])
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&mock_server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let seed_file = write_seed_file(tmp.path(), &[format!("{base_url}/")]).await;
    let config = test_config(
        tmp.path().join("data").to_str().unwrap(),
        seed_file.to_str().unwrap(),
        2,
    );

    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::with_store(config, store.clone());
    orchestrator.run().await.expect("crawl failed");

    let pdf_url = format!("{base_url}/report.pdf");
    let record = store
        .hash_get_fields(&visited_record_key(&pdf_url), &["status_code", "content_type"])
        .await
        .unwrap();
    assert_eq!(record[0], Some("200".to_string()));
    assert_eq!(record[1], Some("application/pdf".to_string()));
}

#[tokio::test]
async fn test_manual_exclusion_blocks_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let domain = url::Url::parse(&base_url).unwrap().host_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let seed_file = write_seed_file(tmp.path(), &[format!("{base_url}/")]).await;
    let exclude_file = tmp.path().join("excluded.txt");
    tokio::fs::write(&exclude_file, &domain).await.unwrap();

    let mut config = test_config(
        tmp.path().join("data").to_str().unwrap(),
        seed_file.to_str().unwrap(),
        1,
    );
    config.crawler.exclude_file = Some(exclude_file.to_str().unwrap().to_string());
    config.crawler.max_duration = Some(3);

    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::with_store(config, store.clone());
    orchestrator.run().await.expect("crawl failed");

    let record = store
        .hash_get_fields(&visited_record_key(&format!("{base_url}/")), &["status_code"])
        .await
        .unwrap();
    assert_eq!(
        record.into_iter().next().flatten(),
        Some("1".to_string()),
        "seed from a manually excluded domain should be recorded with sentinel status 1"
    );
}

#[tokio::test]
async fn test_shutdown_flag_stops_the_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>root</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let seed_file = write_seed_file(tmp.path(), &[format!("{base_url}/")]).await;
    let mut config = test_config(
        tmp.path().join("data").to_str().unwrap(),
        seed_file.to_str().unwrap(),
        1_000_000,
    );
    config.crawler.max_duration = Some(60);

    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::with_store(config, store.clone());
    let shutdown = orchestrator.shutdown_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    });

    let result = tokio::time::timeout(Duration::from_secs(10), orchestrator.run()).await;
    assert!(result.is_ok(), "orchestrator should honor the shutdown flag well before the 60s max_duration");
    result.unwrap().expect("crawl should end cleanly on shutdown");
}
