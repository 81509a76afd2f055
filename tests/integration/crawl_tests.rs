use crate::{test_settings, TIMEOUT};
use crawldown::{Crawler, CrawlerBuilder, Handler, Page};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Accepts pages whose path starts with a prefix and counts them
struct PrefixHandler {
    name: String,
    prefix: String,
    seen: Arc<AtomicUsize>,
}

impl PrefixHandler {
    fn new(name: &str, prefix: &str) -> (Self, Arc<AtomicUsize>) {
        let seen = Arc::new(AtomicUsize::new(0));
        let handler = Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            seen: Arc::clone(&seen),
        };
        (handler, seen)
    }
}

impl Handler for PrefixHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, _url: &str, page: &Page, _crawler: &Crawler) -> bool {
        if page.url.path().starts_with(&self.prefix) {
            self.seen.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

/// Follows every link on a page and remembers page titles
struct LinkFollower {
    titles: Arc<Mutex<Vec<String>>>,
}

impl Handler for LinkFollower {
    fn name(&self) -> &str {
        "links"
    }

    fn handle(&self, _url: &str, page: &Page, crawler: &Crawler) -> bool {
        if let Some(title) = page.title() {
            self.titles.lock().unwrap().push(title);
        }
        for link in page.select("a[href]") {
            if let Some(next) = page.abs_attr(&link, "href") {
                crawler.crawl(&next, TIMEOUT, 1);
            }
        }
        true
    }
}

/// Panics on one path, counts every other page
struct FragileHandler {
    handled: Arc<AtomicUsize>,
}

impl Handler for FragileHandler {
    fn name(&self) -> &str {
        "fragile"
    }

    fn handle(&self, _url: &str, page: &Page, _crawler: &Crawler) -> bool {
        if page.url.path() == "/boom" {
            panic!("cannot handle {}", page.url);
        }
        self.handled.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[tokio::test]
async fn test_transient_crawl_failure_is_bounded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(2, &dir)).build().unwrap();
    let url = format!("{}/down", server.uri());
    assert!(crawler.crawl(&url, TIMEOUT, 2));
    let summary = crawler.shutdown().await;

    assert_eq!(crawler.crawl_attempts(&url), 2);
    assert_eq!(summary.failed_crawls, vec![url]);
    assert_eq!(summary.crawled, 0);
}

#[tokio::test]
async fn test_first_accepting_handler_wins() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let (books, books_seen) = PrefixHandler::new("books", "/books");
    let (fallback, fallback_seen) = PrefixHandler::new("fallback", "/");

    let crawler = CrawlerBuilder::new(test_settings(2, &dir))
        .handler(books)
        .handler(fallback)
        .build()
        .unwrap();
    crawler.crawl(&format!("{}/books/1", server.uri()), TIMEOUT, 1);
    crawler.crawl(&format!("{}/books/2", server.uri()), TIMEOUT, 1);
    crawler.crawl(&format!("{}/about", server.uri()), TIMEOUT, 1);
    let summary = crawler.shutdown().await;

    assert_eq!(books_seen.load(Ordering::SeqCst), 2);
    assert_eq!(fallback_seen.load(Ordering::SeqCst), 1);
    assert_eq!(summary.crawled, 3);
}

#[tokio::test]
async fn test_unhandled_page_is_not_a_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>nothing</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = CrawlerBuilder::new(test_settings(1, &dir)).build().unwrap();
    crawler.crawl(&format!("{}/orphan", server.uri()), TIMEOUT, 3);
    let summary = crawler.shutdown().await;

    assert_eq!(summary.crawled, 1);
    assert!(summary.failed_crawls.is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_spawned_work() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    let page = |title: &str, links: &[&str]| {
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{}\">{}</a>", l, l))
            .collect();
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, anchors
        )
    };

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("root", &["/a", "/b"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("a", &["/", "/c"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("b", &["/c"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("c", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let titles = Arc::new(Mutex::new(Vec::new()));
    let crawler = CrawlerBuilder::new(test_settings(2, &dir))
        .handler(LinkFollower {
            titles: Arc::clone(&titles),
        })
        .build()
        .unwrap();
    crawler.crawl(&format!("{}/", base), TIMEOUT, 1);
    let summary = crawler.shutdown().await;

    let mut titles = titles.lock().unwrap().clone();
    titles.sort();
    assert_eq!(titles, vec!["a", "b", "c", "root"]);
    assert_eq!(summary.crawled, 4);
    assert_eq!(crawler.outstanding(), 0);
}

#[tokio::test]
async fn test_handler_panic_does_not_stall_shutdown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(3)
        .mount(&server)
        .await;

    let handled = Arc::new(AtomicUsize::new(0));
    let crawler = CrawlerBuilder::new(test_settings(1, &dir))
        .handler(FragileHandler {
            handled: Arc::clone(&handled),
        })
        .build()
        .unwrap();
    crawler.crawl(&format!("{}/boom", server.uri()), TIMEOUT, 1);
    crawler.crawl(&format!("{}/after-1", server.uri()), TIMEOUT, 1);
    crawler.crawl(&format!("{}/after-2", server.uri()), TIMEOUT, 1);

    let finished = tokio::time::timeout(Duration::from_secs(10), crawler.shutdown()).await;

    assert!(finished.is_ok());
    assert_eq!(crawler.outstanding(), 0);
    assert_eq!(handled.load(Ordering::SeqCst), 2);
}
