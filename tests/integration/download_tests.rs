use crate::{test_settings, TIMEOUT};
use crawldown::output::read_download_log;
use crawldown::CrawlerBuilder;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_redirect_chain_carries_referer_and_cookies() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", format!("{}/hop", base).as_str())
                .insert_header("Set-Cookie", "sid=abc; Path=/; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hop"))
        .and(header("referer", format!("{}/start", base).as_str()))
        .and(header("cookie", "sid=abc"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/file.pdf"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/file.pdf"))
        .and(header("referer", format!("{}/hop", base).as_str()))
        .and(header("cookie", "sid=abc"))
        .and(header("user-agent", "Wget/1.19.4 (linux-gnu)"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 test".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(2, &dir)).build().unwrap();
    let start = format!("{}/start", base);
    assert!(crawler.download(&start, "book.pdf", "", "", TIMEOUT, 3));
    let summary = crawler.shutdown().await;

    let saved = std::fs::read(dir.path().join("book.pdf")).unwrap();
    assert_eq!(saved, b"%PDF-1.4 test");
    assert_eq!(crawler.download_attempts(&start), 1);
    assert_eq!(summary.downloaded, 1);
    assert!(summary.failed_downloads.is_empty());
}

#[tokio::test]
async fn test_not_found_is_terminal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(2, &dir)).build().unwrap();
    let url = format!("{}/missing.pdf", server.uri());
    crawler.download(&url, "missing.pdf", "", "", TIMEOUT, 5);
    let summary = crawler.shutdown().await;

    assert_eq!(summary.failed_downloads, vec![url.clone()]);
    assert_eq!(crawler.download_attempts(&url), 1);
    assert!(!dir.path().join("missing.pdf").exists());
}

#[tokio::test]
async fn test_bad_request_is_terminal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/quota.pdf"))
        .respond_with(ResponseTemplate::new(400).set_body_string("quota exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(1, &dir)).build().unwrap();
    let url = format!("{}/quota.pdf", server.uri());
    crawler.download(&url, "quota.pdf", "", "", TIMEOUT, 5);
    let summary = crawler.shutdown().await;

    assert_eq!(summary.failed_downloads, vec![url]);
}

#[tokio::test]
async fn test_server_error_retried_until_exhausted() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(2, &dir)).build().unwrap();
    let url = format!("{}/flaky.pdf", server.uri());
    crawler.download(&url, "flaky.pdf", "", "", TIMEOUT, 3);
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.download_attempts(&url), 3);
    assert_eq!(summary.failed_downloads, vec![url]);
    assert_eq!(summary.downloaded, 0);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(2, &dir)).build().unwrap();
    let url = format!("{}/slow.pdf", server.uri());
    crawler.download(&url, "slow.pdf", "", "", Duration::from_millis(100), 2);
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.download_attempts(&url), 2);
    assert_eq!(summary.failed_downloads, vec![url]);
}

#[tokio::test]
async fn test_redirect_loop_hits_limit() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .expect(3)
        .mount(&server)
        .await;

    let mut settings = test_settings(1, &dir);
    settings.max_redirects = 2;
    let crawler = CrawlerBuilder::new(settings).build().unwrap();
    let url = format!("{}/loop", server.uri());
    crawler.download(&url, "loop.pdf", "", "", TIMEOUT, 4);
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.download_attempts(&url), 1);
    assert_eq!(summary.failed_downloads, vec![url]);
}

#[tokio::test]
async fn test_initial_referer_and_cookies_sent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/gated.pdf"))
        .and(header("referer", "https://books.example/page"))
        .and(header("cookie", "token=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(1, &dir)).build().unwrap();
    let url = format!("{}/gated.pdf", server.uri());
    crawler.download(
        &url,
        "nested/gated.pdf",
        "https://books.example/page",
        "token=xyz",
        TIMEOUT,
        1,
    );
    let summary = crawler.shutdown().await;

    assert_eq!(summary.downloaded, 1);
    let saved = std::fs::read_to_string(dir.path().join("nested/gated.pdf")).unwrap();
    assert_eq!(saved, "data");
}

#[tokio::test]
async fn test_download_log_records_final_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/stored.pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stored.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pdf"))
        .mount(&server)
        .await;

    let log_path = dir.path().join("logs/downloads.jsonl");
    let settings = test_settings(2, &dir).with_download_log(&log_path);
    let crawler = CrawlerBuilder::new(settings).build().unwrap();
    crawler.download(&format!("{}/get", server.uri()), "stored.pdf", "", "", TIMEOUT, 1);
    crawler.shutdown().await;

    let records = read_download_log(&log_path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, format!("{}/stored.pdf", server.uri()));
    assert_eq!(records[0].file, "stored.pdf");
}

#[tokio::test]
async fn test_many_downloads_on_few_workers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("content"))
        .expect(20)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(3, &dir)).build().unwrap();
    for i in 0..20 {
        let url = format!("{}/files/{}.pdf", server.uri(), i);
        assert!(crawler.download(&url, &format!("{}.pdf", i), "", "", TIMEOUT, 2));
    }
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.outstanding(), 0);
    assert_eq!(summary.downloaded, 20);
    assert!(summary.failed_downloads.is_empty());
    for i in 0..20 {
        assert!(dir.path().join(format!("{}.pdf", i)).exists());
    }
}

#[tokio::test]
async fn test_transient_failure_after_redirect_retries_hop() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/hop")
                .insert_header("Set-Cookie", "sid=1; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hop"))
        .and(header("referer", format!("{}/start", base).as_str()))
        .and(header("cookie", "sid=1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(2, &dir)).build().unwrap();
    let start = format!("{}/start", base);
    let hop = format!("{}/hop", base);
    crawler.download(&start, "book.pdf", "", "", TIMEOUT, 2);
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.download_attempts(&start), 1);
    assert_eq!(crawler.download_attempts(&hop), 2);
    assert_eq!(summary.failed_downloads, vec![hop]);
    assert_eq!(summary.downloaded, 0);
    assert!(!dir.path().join("book.pdf").exists());
}

#[tokio::test]
async fn test_redirect_without_location_is_not_collected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/nowhere"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(1, &dir)).build().unwrap();
    let url = format!("{}/nowhere", server.uri());
    crawler.download(&url, "nowhere.pdf", "", "", TIMEOUT, 3);
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.download_attempts(&url), 1);
    assert!(summary.failed_downloads.is_empty());
    assert_eq!(summary.downloaded, 0);
}

#[tokio::test]
async fn test_later_set_cookie_replaces_carried_cookie() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", "/b")
                .insert_header("Set-Cookie", "first=1"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .and(header("cookie", "first=1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/c")
                .insert_header("Set-Cookie", "second=2; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/c"))
        .and(header("cookie", "second=2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(1, &dir)).build().unwrap();
    crawler.download(&format!("{}/a", server.uri()), "c.pdf", "", "old=0", TIMEOUT, 1);
    let summary = crawler.shutdown().await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(std::fs::read_to_string(dir.path().join("c.pdf")).unwrap(), "ok");
}

#[tokio::test]
async fn test_large_body_written_completely() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let body: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path("/large.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    std::fs::write(dir.path().join("large.pdf"), b"stale contents").unwrap();

    let crawler = CrawlerBuilder::new(test_settings(1, &dir)).build().unwrap();
    crawler.download(&format!("{}/large.pdf", server.uri()), "large.pdf", "", "", TIMEOUT, 1);
    let summary = crawler.shutdown().await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(std::fs::read(dir.path().join("large.pdf")).unwrap(), body);
}

#[tokio::test]
async fn test_filename_outside_root_is_refused() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(crawldown::CrawlerSettings::new(1, &root))
        .build()
        .unwrap();
    crawler.download(&format!("{}/x.pdf", server.uri()), "../x.pdf", "", "", TIMEOUT, 2);
    crawler.download(&format!("{}/y.pdf", server.uri()), "/tmp/y.pdf", "", "", TIMEOUT, 2);
    let summary = crawler.shutdown().await;

    assert_eq!(summary.downloaded, 0);
    assert!(summary.failed_downloads.is_empty());
    assert!(!dir.path().join("x.pdf").exists());
}
