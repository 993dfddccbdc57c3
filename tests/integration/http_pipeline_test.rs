// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{fast_options, RecordingStore};
use pricewatch::config::settings::Settings;
use pricewatch::domain::services::validator::RuleValidator;
use pricewatch::engines::registry::AdapterRegistry;
use pricewatch::workers::{ManagerOptions, ScrapingManager};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT_PAGE: &str = r#"
<html>
  <body>
    <h1 class="product-title">  Apple   iPhone 15 Pro  </h1>
    <span class="price">$1,299.00</span>
    <div class="stock">Only 3 left - In Stock</div>
    <a class="brand">Apple</a>
    <img class="main" src="https://cdn.example.com/iphone.jpg"/>
    <span class="rating">4.6 out of 5 stars</span>
    <span class="reviews">1,024 ratings</span>
  </body>
</html>
"#;

const BROKEN_PAGE: &str = "<html><body><p>Temporarily unavailable</p></body></html>";

fn write_config(dir: &std::path::Path) {
    std::fs::write(
        dir.join("default.toml"),
        r#"
[scraping]
concurrent_workers = 2
default_rate_limit = 0.0
request_timeout_secs = 5

[retry]
max_retries = 0

[sites.shop]
rate_limit = 0.0
currency = "EUR"
category = "phones"
aliases = ["shop.example"]

[sites.shop.selectors]
title = "h1.product-title"
price = ".price"
availability = ".stock"
brand = ".brand"
image = "img.main"
rating = ".rating"
reviews = ".reviews"
"#,
    )
    .unwrap();
}

#[tokio::test]
async fn test_configured_site_is_scraped_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/iphone"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BROKEN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let settings = Arc::new(Settings::load_from(dir.path()).unwrap());

    let registry = AdapterRegistry::from_settings(&settings).unwrap();
    assert_eq!(registry.sites(), vec!["shop", "shop.example"]);

    let store = Arc::new(RecordingStore::default());
    let manager = ScrapingManager::new(
        settings.clone(),
        Arc::new(registry),
        Arc::new(RuleValidator::new(settings.validation.clone())),
        store.clone(),
    )
    .with_options(ManagerOptions {
        execution_mode: settings.scraping.execution_mode,
        ..fast_options()
    });

    manager
        .add_job("shop", format!("{}/p/iphone", server.uri()), 1)
        .unwrap();
    manager
        .add_job("shop.example", format!("{}/p/broken", server.uri()), 1)
        .unwrap();
    manager
        .add_job("SHOP", format!("{}/p/gone", server.uri()), 1)
        .unwrap();

    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_completed, 1);
    assert_eq!(snap.jobs_failed, 2);

    let points = store.price_points.lock();
    assert_eq!(points.len(), 1);
    let (_, point) = &points[0];
    assert_eq!(point.price, 1299.0);
    assert_eq!(point.currency, "EUR");
    assert_eq!(point.availability.as_deref(), Some("in_stock"));
    assert_eq!(point.metadata["site"], "shop");
    assert_eq!(point.metadata["extraction_method"], "static");
    assert_eq!(point.metadata["category"], "phones");

    assert_eq!(*store.products.lock(), vec!["Apple iPhone 15 Pro".to_string()]);
}
