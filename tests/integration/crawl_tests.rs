//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small device site and run the full
//! resolve, list, extract and persist cycle against it.

use device_catalog::config::{
    Config, ExtractionConfig, ExtractionPolicy, FetcherConfig, InputConfig, OutputConfig,
    SelectorConfig, SiteConfig, TargetList, TargetSpec, Transport,
};
use device_catalog::crawler::Coordinator;
use device_catalog::FetchError;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX: &str = r#"<html><body><div class="st-text"><table><tr>
    <td><a href="acme-phones-101.php">Acme<br><span>3 devices</span></a></td>
    <td><a href="zeta-phones-7.php">Zeta<br><span>12 devices</span></a></td>
</tr></table></div></body></html>"#;

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output: &Path, policy: ExtractionPolicy) -> Config {
    let mut fetcher = FetcherConfig::with_defaults(Transport::Http);
    fetcher.request_delay_ms = 0;
    fetcher.rate_limit_cooldown_ms = 10; // Very short for testing
    fetcher.max_rate_limit_retries = 2;

    Config {
        site: SiteConfig {
            base_url: format!("{}/", base_url),
            brand_index_path: "makers.php3".to_string(),
        },
        fetcher,
        extraction: ExtractionConfig { policy },
        input: InputConfig {
            targets_path: "target_devices.csv".to_string(),
        },
        output: OutputConfig {
            directory: output.display().to_string(),
        },
        selectors: SelectorConfig::default(),
    }
}

fn targets(brand: &str, models: &[&str]) -> TargetList {
    TargetList::new(vec![TargetSpec {
        brand: brand.to_string(),
        models: models.iter().map(|m| m.to_string()).collect(),
    }])
}

fn device_page(name: &str, rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(k, v)| format!("<tr><td class=\"ttl\">{}</td><td class=\"nfo\">{}</td></tr>", k, v))
        .collect();
    format!(
        r#"<html><body>
        <h1 class="specs-phone-name-title">{}</h1>
        <div id="specs-list"><table cellspacing="0">{}</table></div>
        </body></html>"#,
        name, rows
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mounts the brand index and a one-device Acme listing
async fn mount_acme_site(server: &MockServer) {
    mount_page(server, "/makers.php3", INDEX.to_string()).await;
    mount_page(
        server,
        "/acme-phones-101.php",
        r#"<html><body><div class="section-body"><div class="makers"><ul>
            <li><a href="acme_x1-1.php"><img src="x1.jpg"><strong><span>Acme X1</span></strong></a></li>
        </ul></div></div></body></html>"#
            .to_string(),
    )
    .await;
}

#[tokio::test]
async fn test_end_to_end_single_device() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_acme_site(&server).await;
    mount_page(&server, "/acme_x1-1.php", device_page("Acme X1", &[("Display", "6.1 inch")])).await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let mut coordinator =
        Coordinator::new(config, targets("acme", &[])).expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.brands_resolved, 1);
    assert_eq!(stats.persisted, 1);

    let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
    assert_eq!(content, "Brand,Model Name,Display\nAcme,Acme X1,6.1 inch\n");
}

#[tokio::test]
async fn test_second_run_appends_no_rows() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_acme_site(&server).await;
    mount_page(&server, "/acme_x1-1.php", device_page("Acme X1", &[("Display", "6.1 inch")])).await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    Coordinator::new(config.clone(), targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();
    let first = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();

    let stats = Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();
    let second = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();

    assert_eq!(stats.persisted, 0);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_known_device_page_is_never_fetched() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    std::fs::write(
        output.path().join("Acme.csv"),
        "Brand,Model Name,Display\nAcme,Acme X1,6.1 inch\n",
    )
    .unwrap();
    mount_acme_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/acme_x1-1.php"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let stats = Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.candidates, 0);
    assert_eq!(stats.brands_skipped, 1);
}

#[tokio::test]
async fn test_rate_limited_device_page_is_retried() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_acme_site(&server).await;

    // First request is throttled, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/acme_x1-1.php"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/acme_x1-1.php", device_page("Acme X1", &[("Display", "6.1 inch")])).await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let stats = Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.rate_limited, 1);

    let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
    assert_eq!(content, "Brand,Model Name,Display\nAcme,Acme X1,6.1 inch\n");
}

#[tokio::test]
async fn test_persistent_rate_limit_skips_device() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_acme_site(&server).await;

    // Initial attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/acme_x1-1.php"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let stats = Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.empty, 1);
    assert_eq!(stats.persisted, 0);
    assert!(!output.path().join("Acme.csv").exists());
}

#[tokio::test]
async fn test_pagination_visits_entry_page_first() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_page(&server, "/makers.php3", INDEX.to_string()).await;
    mount_page(
        &server,
        "/acme-phones-101.php",
        r##"<html><body>
        <div class="section-body"><ul>
            <li><a href="acme_x1-1.php"><strong><span>Acme X1</span></strong></a></li>
        </ul></div>
        <div class="nav-pages">
            <strong>1</strong>
            <a href="acme-phones-f-101-0-p2.php">2</a>
            <a class="prevnextbutton" href="acme-phones-f-101-0-p2.php">&gt;</a>
        </div>
        </body></html>"##
            .to_string(),
    )
    .await;
    mount_page(
        &server,
        "/acme-phones-f-101-0-p2.php",
        r#"<html><body><div class="section-body"><ul>
            <li><a href="acme_x0-0.php"><strong><span>Acme X0</span></strong></a></li>
        </ul></div></body></html>"#
            .to_string(),
    )
    .await;
    mount_page(&server, "/acme_x1-1.php", device_page("Acme X1", &[("Display", "6.1 inch")])).await;
    mount_page(&server, "/acme_x0-0.php", device_page("Acme X0", &[("Display", "5.0 inch")])).await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let stats = Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.persisted, 2);
    let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
    assert_eq!(
        content,
        "Brand,Model Name,Display\nAcme,Acme X1,6.1 inch\nAcme,Acme X0,5.0 inch\n"
    );
}

#[tokio::test]
async fn test_narrow_policy_writes_price_columns() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_acme_site(&server).await;
    mount_page(
        &server,
        "/acme_x1-1.php",
        device_page("Acme X1", &[("Display", "6.1 inch"), ("Price", "About 200 EUR")]),
    )
    .await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Narrow);
    Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
    assert_eq!(content, "Brand,Model Name,Price\nAcme,Acme X1,About 200 EUR\n");
}

#[tokio::test]
async fn test_unmatched_brand_writes_nothing() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    mount_acme_site(&server).await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let stats = Coordinator::new(config, targets("nokia", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.brands_resolved, 0);
    assert_eq!(stats.persisted, 0);
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_brand_index_ends_run_cleanly() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/makers.php3"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), output.path(), ExtractionPolicy::Full);
    let stats = Coordinator::new(config, targets("acme", &[]))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.brands_resolved, 0);
}

#[test]
fn test_fetch_error_messages() {
    let err = FetchError::RateLimited {
        url: "https://site.test/a.php".to_string(),
        attempts: 3,
    };
    assert_eq!(
        err.to_string(),
        "Still rate limited after 3 attempts: https://site.test/a.php"
    );
}
