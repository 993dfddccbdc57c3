// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::memory_db;
use chrono::{Duration, Utc};
use pricewatch::domain::models::product::PricePoint;
use pricewatch::domain::repositories::price_repository::{PriceRepository, RepositoryError};
use pricewatch::infrastructure::database::entities::{price_history, product, product_url, site};
use pricewatch::infrastructure::repositories::SeaOrmPriceRepository;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;

#[tokio::test]
async fn test_upsert_site_is_idempotent() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db.clone());

    let first = repo
        .upsert_site("amazon", "https://www.amazon.com", "static", 2.0)
        .await
        .unwrap();
    let second = repo
        .upsert_site("amazon", "https://www.amazon.com", "static", 2.0)
        .await
        .unwrap();
    let other = repo
        .upsert_site("ebay", "https://www.ebay.com", "static", 1.5)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(site::Entity::find().count(db.as_ref()).await.unwrap(), 2);

    let stored = site::Entity::find_by_id(other)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.base_url, "https://www.ebay.com");
    assert_eq!(stored.rate_limit, 1.5);
}

#[tokio::test]
async fn test_upsert_product_identity_includes_brand_and_model() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db.clone());

    let plain = repo
        .upsert_product("Kindle Paperwhite", "electronics", None, None)
        .await
        .unwrap();
    let plain_again = repo
        .upsert_product("Kindle Paperwhite", "electronics", None, None)
        .await
        .unwrap();
    let branded = repo
        .upsert_product("Kindle Paperwhite", "electronics", Some("Amazon"), None)
        .await
        .unwrap();
    let branded_again = repo
        .upsert_product("Kindle Paperwhite", "electronics", Some("Amazon"), None)
        .await
        .unwrap();
    let with_model = repo
        .upsert_product("Kindle Paperwhite", "electronics", Some("Amazon"), Some("M2L3EK"))
        .await
        .unwrap();

    assert_eq!(plain, plain_again);
    assert_eq!(branded, branded_again);
    assert_ne!(plain, branded);
    assert_ne!(branded, with_model);
    assert_eq!(product::Entity::find().count(db.as_ref()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_upsert_product_rejects_empty_name() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db);

    let err = repo
        .upsert_product("   ", "electronics", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidData(_)));
}

#[tokio::test]
async fn test_product_url_is_unique_per_product_and_site() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db.clone());

    let site_id = repo
        .upsert_site("amazon", "https://www.amazon.com", "static", 2.0)
        .await
        .unwrap();
    let product_id = repo
        .upsert_product("Echo Dot", "electronics", None, None)
        .await
        .unwrap();

    let first = repo
        .upsert_product_url(product_id, site_id, "https://www.amazon.com/dp/B09B8V1LZ3")
        .await
        .unwrap();
    let moved = repo
        .upsert_product_url(product_id, site_id, "https://www.amazon.com/dp/B09B8V1LZ3?th=1")
        .await
        .unwrap();

    assert_eq!(first, moved);
    let stored = product_url::Entity::find_by_id(first)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.url, "https://www.amazon.com/dp/B09B8V1LZ3?th=1");
    assert!(stored.is_active);
}

#[tokio::test]
async fn test_price_points_are_appended() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db.clone());

    let site_id = repo
        .upsert_site("ebay", "https://www.ebay.com", "static", 1.5)
        .await
        .unwrap();
    let product_id = repo
        .upsert_product("Nintendo Switch OLED", "electronics", Some("Nintendo"), None)
        .await
        .unwrap();
    let url_id = repo
        .upsert_product_url(product_id, site_id, "https://www.ebay.com/itm/1")
        .await
        .unwrap();

    for price in [349.99, 329.0] {
        let point = PricePoint {
            price,
            currency: "USD".to_string(),
            availability: Some("in_stock".to_string()),
            scraped_at: Utc::now(),
            metadata: json!({"site": "ebay"}),
        };
        repo.insert_price_point(url_id, &point).await.unwrap();
    }

    let history = price_history::Entity::find()
        .filter(price_history::Column::ProductUrlId.eq(url_id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let prices: Vec<f64> = history.iter().filter_map(|h| h.price).collect();
    assert!(prices.contains(&349.99));
    assert!(prices.contains(&329.0));
    assert_eq!(history[0].currency, "USD");
    assert_eq!(history[0].scraper_metadata, Some(json!({"site": "ebay"})));
}

#[tokio::test]
async fn test_price_history_is_newest_first_and_limited() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db);

    let site_id = repo
        .upsert_site("amazon", "https://www.amazon.com", "static", 2.0)
        .await
        .unwrap();
    let product_id = repo
        .upsert_product("Kindle Paperwhite", "electronics", Some("Amazon"), None)
        .await
        .unwrap();
    let url_id = repo
        .upsert_product_url(product_id, site_id, "https://www.amazon.com/dp/B08KTZ8249")
        .await
        .unwrap();

    assert!(repo.get_latest_price(url_id).await.unwrap().is_none());
    assert!(repo.get_price_history(url_id, 10).await.unwrap().is_empty());

    let start = Utc::now() - Duration::hours(3);
    for (hour, price) in [(0, 149.99), (1, 139.99), (2, 129.99)] {
        let point = PricePoint {
            price,
            currency: "USD".to_string(),
            availability: None,
            scraped_at: start + Duration::hours(hour),
            metadata: json!({}),
        };
        repo.insert_price_point(url_id, &point).await.unwrap();
    }

    let history = repo.get_price_history(url_id, 2).await.unwrap();
    let prices: Vec<Option<f64>> = history.iter().map(|h| h.price).collect();
    assert_eq!(prices, vec![Some(129.99), Some(139.99)]);
    assert!(history.iter().all(|h| h.product_url_id == url_id));

    let latest = repo.get_latest_price(url_id).await.unwrap().unwrap();
    assert_eq!(latest.price, Some(129.99));
    assert_eq!(latest.currency, "USD");
}

#[tokio::test]
async fn test_active_product_urls_filter_by_site() {
    let db = memory_db().await;
    let repo = SeaOrmPriceRepository::new(db.clone());

    let amazon = repo
        .upsert_site("amazon", "https://www.amazon.com", "static", 2.0)
        .await
        .unwrap();
    let ebay = repo
        .upsert_site("ebay", "https://www.ebay.com", "static", 1.5)
        .await
        .unwrap();
    let product_id = repo
        .upsert_product("Steam Deck OLED", "electronics", Some("Valve"), None)
        .await
        .unwrap();
    let amazon_url = repo
        .upsert_product_url(product_id, amazon, "https://www.amazon.com/dp/B0CL")
        .await
        .unwrap();
    let ebay_url = repo
        .upsert_product_url(product_id, ebay, "https://www.ebay.com/itm/55")
        .await
        .unwrap();

    let all = repo.get_active_product_urls(None).await.unwrap();
    let ids: Vec<i32> = all.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![amazon_url, ebay_url]);

    let only_ebay = repo.get_active_product_urls(Some(ebay)).await.unwrap();
    assert_eq!(only_ebay.len(), 1);
    assert_eq!(only_ebay[0].url, "https://www.ebay.com/itm/55");
    assert_eq!(only_ebay[0].product_id, product_id);

    // 停用的URL不再返回
    let stored = product_url::Entity::find_by_id(amazon_url)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: product_url::ActiveModel = stored.into();
    active.is_active = Set(false);
    active.update(db.as_ref()).await.unwrap();

    let remaining = repo.get_active_product_urls(None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ebay_url);
}
