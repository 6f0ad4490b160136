//! Integration tests for the job pipeline
//!
//! These tests use wiremock to stand in for the rendering service and drive
//! whole jobs from submission to a terminal phase.

use async_trait::async_trait;
use offer_harvest::config::{Config, FetchServiceConfig, ProxyConfig, SiteConfig, WorkerConfig};
use offer_harvest::crawler::{FetchFailure, PageFetcher};
use offer_harvest::state::JobResult;
use offer_harvest::{HarvestError, JobKind, JobPhase, JobStatus, Pipeline, ProductView};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const SITE: &str = "https://www.carrefour.fr";

/// Matches fetch-service calls by the target URL in the request envelope
struct TargetUrl(String);

impl Match for TargetUrl {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .map(|body| body["url"] == self.0.as_str())
            .unwrap_or(false)
    }
}

fn target(url: &str) -> TargetUrl {
    TargetUrl(url.to_string())
}

/// Creates a test configuration pointed at the given fetch service
fn create_test_config(endpoint: String) -> Config {
    Config {
        fetch_service: FetchServiceConfig {
            endpoint,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 2_000,
            max_retries: 2,
            backoff_base_ms: 0,
            backoff_jitter_ms: 0,
        },
        proxy: None,
        workers: WorkerConfig {
            worker_count: 2,
            per_worker_concurrency: 4,
            progress_interval_ms: 10,
        },
        site: SiteConfig {
            base_url: SITE.to_string(),
            image_base_url: "https://media.carrefour.fr/medias/".to_string(),
            default_seller: "Carrefour".to_string(),
        },
        images: None,
    }
}

fn envelope(html: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 200, "source": html}))
}

/// A product page whose embedded state carries the given offers
fn product_page(id: &str, title: &str, selected: &str, offers: &[(&str, &str, f64)]) -> String {
    let offers: serde_json::Map<String, Value> = offers
        .iter()
        .map(|(offer_id, seller, price)| {
            (
                offer_id.to_string(),
                json!({
                    "offerId": offer_id,
                    "price": {"price": price},
                    "marketplace": {"seller": {"name": seller}},
                    "shipping": {"free": true}
                }),
            )
        })
        .collect();

    let mut offers_by_product = serde_json::Map::new();
    offers_by_product.insert(id.to_string(), Value::Object(offers));

    let mut entities = serde_json::Map::new();
    entities.insert(
        id.to_string(),
        json!({"attributes": {
            "title": title,
            "selectedOfferId": selected,
            "offers": Value::Object(offers_by_product)
        }}),
    );

    let state = json!({"vuex": {"pdp": {"productEntities": Value::Object(entities)}}});
    format!(
        "<html><head><script>window.__INITIAL_STATE__ = {};</script></head><body><h1>{}</h1></body></html>",
        state, title
    )
}

async fn run_to_end(pipeline: &Pipeline, kind: JobKind, urls: Vec<String>, pages: u32) -> JobStatus {
    let id = pipeline.submit(kind, urls, pages).unwrap();
    tokio::time::timeout(
        Duration::from_secs(20),
        pipeline.wait_for(id, Duration::from_millis(10)),
    )
    .await
    .expect("job did not finish in time")
    .expect("job vanished from the tracker")
}

/// Serves pages from memory, failing every URL it does not know
struct StaticFetcher {
    pages: HashMap<String, String>,
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        self.pages
            .get(url)
            .cloned()
            .ok_or(FetchFailure::HttpStatus(404))
    }
}

/// Panics on one URL, serves a fixed page otherwise
struct PanickingFetcher {
    poisoned: String,
    page: String,
}

#[async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        if url == self.poisoned {
            panic!("fetcher blew up on {}", url);
        }
        Ok(self.page.clone())
    }
}

fn static_pipeline(pages: HashMap<String, String>) -> Pipeline {
    Pipeline::with_components(
        create_test_config("http://127.0.0.1:9/unused".to_string()),
        Arc::new(StaticFetcher { pages }),
        None,
    )
    .unwrap()
}

fn product_urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|n| format!("{}/p/article-{}", SITE, 1000 + n))
        .collect()
}

#[tokio::test]
async fn test_store_job_end_to_end() {
    let server = MockServer::start().await;
    let store = format!("{}/r/cremerie", SITE);
    let lait = format!("{}/p/lait-3560070472888", SITE);
    let beurre = format!("{}/p/beurre-3228021170039", SITE);

    Mock::given(target(&format!("{}?noRedirect=1&page=1", store)))
        .respond_with(envelope(
            r#"<html><body>
                <a href="/p/lait-3560070472888?from=list">Lait</a>
                <script>var data = {"next":"\/p\/beurre-3228021170039"};</script>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(target(&format!("{}?noRedirect=1&page=2", store)))
        .respond_with(envelope(
            r#"<html><body><a href="/p/lait-3560070472888">Lait</a></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(target(&lait))
        .respond_with(envelope(&product_page(
            "3560070472888",
            "Lait demi-écrémé",
            "A",
            &[("A", "Carrefour", 1.09)],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(target(&beurre))
        .respond_with(envelope(&product_page(
            "3228021170039",
            "Beurre doux",
            "A",
            &[("A", "Carrefour", 2.35), ("B", "Laiterie", 2.10)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(create_test_config(format!("{}/fetch", server.uri()))).unwrap();
    let status = run_to_end(&pipeline, JobKind::Store, vec![store], 2).await;

    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.results_count, 2);
    assert_eq!(status.error_count, 0);
    assert_eq!(status.processed, status.total);
    assert!(status.completed_at.is_some());

    let mut views: Vec<ProductView> = status
        .results
        .unwrap()
        .into_iter()
        .map(|result| match result {
            JobResult::Ok(view) => view,
            JobResult::Error { url, error } => panic!("{} failed: {}", url, error),
        })
        .collect();
    views.sort_by(|a, b| a.url().cmp(b.url()));

    match &views[0] {
        ProductView::FullDetail {
            url,
            ean,
            title,
            price,
            seller,
            ..
        } => {
            assert_eq!(url, &beurre);
            assert_eq!(ean.as_deref(), Some("3228021170039"));
            assert_eq!(title, "Beurre doux");
            // Full-detail records report the lowest offer
            assert_eq!(*price, 2.10);
            assert_eq!(seller.as_deref(), Some("Laiterie"));
        }
        other => panic!("unexpected view: {:?}", other),
    }
    assert_eq!(views[1].url(), lait);
}

#[tokio::test]
async fn test_store_scan_failure_when_all_pages_time_out() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .respond_with(envelope("<html></html>").set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let mut config = create_test_config(format!("{}/fetch", server.uri()));
    config.fetch_service.connect_timeout_ms = 100;
    config.fetch_service.request_timeout_ms = 100;
    config.fetch_service.max_retries = 1;
    let pipeline = Pipeline::new(config).unwrap();

    let status = run_to_end(
        &pipeline,
        JobKind::Store,
        vec![format!("{}/r/epicerie", SITE)],
        2,
    )
    .await;

    assert_eq!(status.phase, JobPhase::Failed);
    assert_eq!(status.total, 2);
    assert_eq!(status.error_count, 2);
    assert_eq!(status.results_count, 0);
    let message = status.message.unwrap();
    assert!(message.starts_with("Page scan failed"), "{}", message);
    assert!(message.contains("timeout"), "{}", message);
}

#[tokio::test]
async fn test_ten_failures_still_complete() {
    let pipeline = static_pipeline(HashMap::new());
    let status = run_to_end(&pipeline, JobKind::Product, product_urls(10), 1).await;

    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.error_count, 10);
    assert_eq!(status.results_count, 10);
    assert!(status.results.unwrap().iter().all(|result| matches!(
        result,
        JobResult::Error { error, .. } if error == "http_status:404"
    )));
}

#[tokio::test]
async fn test_eleven_failures_fail_the_job() {
    let pipeline = static_pipeline(HashMap::new());
    let status = run_to_end(&pipeline, JobKind::Product, product_urls(11), 1).await;

    assert_eq!(status.phase, JobPhase::Failed);
    assert_eq!(status.error_count, 11);
    assert_eq!(status.results_count, 0);
    assert!(status.message.unwrap().starts_with("Product scrape failed"));
}

#[tokio::test]
async fn test_mostly_successful_large_job_completes() {
    let urls = product_urls(12);
    let mut pages = HashMap::new();
    pages.insert(
        urls[0].clone(),
        product_page("1000", "Article", "A", &[("A", "Carrefour", 3.0)]),
    );
    pages.insert(
        urls[1].clone(),
        product_page("1001", "Article", "A", &[("A", "Carrefour", 3.0)]),
    );

    // 10 of 12 failing is below the 90% threshold
    let status = run_to_end(&static_pipeline(pages), JobKind::ListingPrice, urls, 1).await;
    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.results_count, 12);
    assert_eq!(status.error_count, 10);
}

#[tokio::test]
async fn test_empty_product_job_completes() {
    let pipeline = static_pipeline(HashMap::new());
    let status = run_to_end(&pipeline, JobKind::Product, Vec::new(), 1).await;

    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.total, 0);
    assert_eq!(status.results_count, 0);
    assert_eq!(status.results, Some(Vec::new()));
}

#[tokio::test]
async fn test_store_without_products_completes_empty() {
    let store = format!("{}/r/vide", SITE);
    let mut pages = HashMap::new();
    pages.insert(
        format!("{}?noRedirect=1&page=1", store),
        "<html><body><a href=\"/r/autre\">x</a></body></html>".to_string(),
    );

    // Page 2 is unknown to the fetcher: one of two scans fails
    let status = run_to_end(&static_pipeline(pages), JobKind::Store, vec![store], 2).await;
    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.results_count, 0);
    assert_eq!(status.error_count, 1);
}

#[tokio::test]
async fn test_price_modes_disagree_on_the_same_page() {
    let url = format!("{}/p/cafe-3017620422003", SITE);
    let mut pages = HashMap::new();
    pages.insert(
        url.clone(),
        product_page(
            "3017620422003",
            "Café",
            "A",
            &[("A", "Seller A", 10.50), ("B", "Seller B", 8.00)],
        ),
    );
    let pipeline = static_pipeline(pages);

    let listing = run_to_end(&pipeline, JobKind::ListingPrice, vec![url.clone()], 1).await;
    let check = run_to_end(&pipeline, JobKind::PriceCheck, vec![url.clone()], 1).await;
    let repricing = run_to_end(&pipeline, JobKind::Repricing, vec![url], 1).await;

    match &listing.results.unwrap()[0] {
        JobResult::Ok(ProductView::ListingPrice { price, seller, .. }) => {
            assert_eq!(*price, 8.00);
            assert_eq!(seller.as_deref(), Some("Seller B"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    match &check.results.unwrap()[0] {
        JobResult::Ok(ProductView::PriceCheck { price, seller, .. }) => {
            assert_eq!(*price, 10.50);
            assert_eq!(seller, "Seller A");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    match &repricing.results.unwrap()[0] {
        JobResult::Ok(ProductView::Repricing {
            price,
            seller,
            competitors,
            ..
        }) => {
            assert_eq!(*price, 8.00);
            assert_eq!(seller, "Seller B");
            assert_eq!(competitors.len(), 1);
            assert_eq!(competitors[0].seller, "Seller A");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_panicking_unit_becomes_placeholder() {
    let urls = product_urls(3);
    let pipeline = Pipeline::with_components(
        create_test_config("http://127.0.0.1:9/unused".to_string()),
        Arc::new(PanickingFetcher {
            poisoned: urls[1].clone(),
            page: product_page("1", "Article", "A", &[("A", "Carrefour", 1.0)]),
        }),
        None,
    )
    .unwrap();

    let status = run_to_end(&pipeline, JobKind::ListingPrice, urls.clone(), 1).await;
    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.error_count, 1);

    let results = status.results.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().any(|result| matches!(
        result,
        JobResult::Error { url, error } if url == &urls[1] && error == "unit_panicked"
    )));
}

#[tokio::test]
async fn test_rate_limit_rotates_proxy_session() {
    let server = MockServer::start().await;
    let url = format!("{}/p/eau-3274080005003", SITE);

    Mock::given(target(&url))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(target(&url))
        .respond_with(envelope(&product_page(
            "3274080005003",
            "Eau minérale",
            "A",
            &[("A", "Carrefour", 0.45)],
        )))
        .mount(&server)
        .await;

    let mut config = create_test_config(format!("{}/fetch", server.uri()));
    config.proxy = Some(ProxyConfig {
        host: "proxy.example.net".to_string(),
        port: 7777,
        username: "customer-acme".to_string(),
        password: "hunter2".to_string(),
        min_session_requests: 1000,
        max_session_requests: 1500,
    });
    let pipeline = Pipeline::new(config).unwrap();

    let status = run_to_end(&pipeline, JobKind::PriceCheck, vec![url], 1).await;
    assert_eq!(status.phase, JobPhase::Completed);
    assert_eq!(status.error_count, 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let proxies: Vec<String> = requests
        .iter()
        .map(|request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            body["proxy"].as_str().unwrap().to_string()
        })
        .collect();
    assert!(proxies[0].starts_with("http://customer-acme-session-"));
    assert!(proxies[1].starts_with("http://customer-acme-session-"));
    assert_ne!(proxies[0], proxies[1]);
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let pipeline = static_pipeline(HashMap::new());
    assert!(pipeline
        .submit(JobKind::Store, vec![format!("{}/r/x", SITE)], 0)
        .is_err());
    assert!(pipeline.tracker().is_empty());
}

#[test]
fn test_unvalidated_config_is_rejected() {
    let mut zero_interval = create_test_config("http://127.0.0.1:9/unused".to_string());
    zero_interval.workers.progress_interval_ms = 0;
    let fetcher = Arc::new(StaticFetcher {
        pages: HashMap::new(),
    });
    assert!(matches!(
        Pipeline::with_components(zero_interval, fetcher, None),
        Err(HarvestError::Config(_))
    ));

    let mut inverted_budget = create_test_config("http://127.0.0.1:9/unused".to_string());
    inverted_budget.proxy = Some(ProxyConfig {
        host: "proxy.example.net".to_string(),
        port: 7777,
        username: "customer-acme".to_string(),
        password: "hunter2".to_string(),
        min_session_requests: 10,
        max_session_requests: 5,
    });
    assert!(matches!(
        Pipeline::new(inverted_budget),
        Err(HarvestError::Config(_))
    ));
}
