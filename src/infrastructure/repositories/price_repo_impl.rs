// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::product::{PriceHistoryEntry, PricePoint, TrackedUrl};
use crate::domain::repositories::price_repository::{PriceRepository, RepositoryError};
use crate::domain::repositories::session_repository::{ScrapingSessionRepository, SessionStatus};
use crate::infrastructure::database::entities::{
    price_history, product, product_url, scraping_error, scraping_session, site,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// 价格仓库实现
///
/// 同时实现抓取会话仓库。查找或创建在唯一约束冲突时会重新查询一次
#[derive(Clone)]
pub struct SeaOrmPriceRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmPriceRepository {
    /// 创建新的价格仓库实现
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_site(&self, name: &str) -> Result<Option<site::Model>, RepositoryError> {
        Ok(site::Entity::find()
            .filter(site::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await?)
    }

    async fn find_product(
        &self,
        name: &str,
        brand: Option<&str>,
        model: Option<&str>,
    ) -> Result<Option<product::Model>, RepositoryError> {
        let mut query = product::Entity::find().filter(product::Column::Name.eq(name));
        query = match brand {
            Some(brand) => query.filter(product::Column::Brand.eq(brand)),
            None => query.filter(product::Column::Brand.is_null()),
        };
        query = match model {
            Some(model) => query.filter(product::Column::Model.eq(model)),
            None => query.filter(product::Column::Model.is_null()),
        };
        Ok(query.one(self.db.as_ref()).await?)
    }

    async fn find_product_url(
        &self,
        product_id: i32,
        site_id: i32,
    ) -> Result<Option<product_url::Model>, RepositoryError> {
        Ok(product_url::Entity::find()
            .filter(product_url::Column::ProductId.eq(product_id))
            .filter(product_url::Column::SiteId.eq(site_id))
            .one(self.db.as_ref())
            .await?)
    }

    async fn find_session(&self, session_id: Uuid) -> Result<scraping_session::Model, RepositoryError> {
        scraping_session::Entity::find()
            .filter(scraping_session::Column::SessionId.eq(session_id.to_string()))
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

fn to_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl From<price_history::Model> for PriceHistoryEntry {
    fn from(model: price_history::Model) -> Self {
        Self {
            id: model.id,
            product_url_id: model.product_url_id,
            price: model.price,
            currency: model.currency,
            availability: model.availability,
            scraped_at: model.scraped_at.with_timezone(&Utc),
            metadata: model.scraper_metadata,
        }
    }
}

impl From<product_url::Model> for TrackedUrl {
    fn from(model: product_url::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            site_id: model.site_id,
            url: model.url,
        }
    }
}

#[async_trait]
impl PriceRepository for SeaOrmPriceRepository {
    async fn upsert_site(
        &self,
        name: &str,
        base_url: &str,
        kind: &str,
        rate_limit: f64,
    ) -> Result<i32, RepositoryError> {
        if name.trim().is_empty() {
            return Err(RepositoryError::InvalidData("site name is empty".to_string()));
        }
        if let Some(existing) = self.find_site(name).await? {
            return Ok(existing.id);
        }

        let model = site::ActiveModel {
            name: Set(name.to_string()),
            base_url: Set(base_url.to_string()),
            scraper_type: Set(kind.to_string()),
            rate_limit: Set(rate_limit),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        match site::Entity::insert(model).exec(self.db.as_ref()).await {
            Ok(res) => Ok(res.last_insert_id),
            Err(e) => match self.find_site(name).await? {
                Some(existing) => Ok(existing.id),
                None => Err(e.into()),
            },
        }
    }

    async fn upsert_product(
        &self,
        name: &str,
        category: &str,
        brand: Option<&str>,
        model: Option<&str>,
    ) -> Result<i32, RepositoryError> {
        if name.trim().is_empty() {
            return Err(RepositoryError::InvalidData("product name is empty".to_string()));
        }
        if let Some(existing) = self.find_product(name, brand, model).await? {
            return Ok(existing.id);
        }

        let now = Utc::now();
        let active = product::ActiveModel {
            name: Set(name.to_string()),
            category: Set(category.to_string()),
            brand: Set(brand.map(str::to_string)),
            model: Set(model.map(str::to_string)),
            status: Set("active".to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        match product::Entity::insert(active).exec(self.db.as_ref()).await {
            Ok(res) => Ok(res.last_insert_id),
            Err(e) => match self.find_product(name, brand, model).await? {
                Some(existing) => Ok(existing.id),
                None => Err(e.into()),
            },
        }
    }

    async fn upsert_product_url(
        &self,
        product_id: i32,
        site_id: i32,
        url: &str,
    ) -> Result<i32, RepositoryError> {
        if let Some(existing) = self.find_product_url(product_id, site_id).await? {
            if existing.url != url {
                let id = existing.id;
                let mut active: product_url::ActiveModel = existing.into();
                active.url = Set(url.to_string());
                active.update(self.db.as_ref()).await?;
                return Ok(id);
            }
            return Ok(existing.id);
        }

        let active = product_url::ActiveModel {
            product_id: Set(product_id),
            site_id: Set(site_id),
            url: Set(url.to_string()),
            selector_config: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        match product_url::Entity::insert(active).exec(self.db.as_ref()).await {
            Ok(res) => Ok(res.last_insert_id),
            Err(e) => match self.find_product_url(product_id, site_id).await? {
                Some(existing) => Ok(existing.id),
                None => Err(e.into()),
            },
        }
    }

    async fn insert_price_point(
        &self,
        product_url_id: i32,
        point: &PricePoint,
    ) -> Result<(), RepositoryError> {
        let active = price_history::ActiveModel {
            product_url_id: Set(product_url_id),
            price: Set(Some(point.price)),
            currency: Set(point.currency.clone()),
            availability: Set(point.availability.clone()),
            scraped_at: Set(point.scraped_at.into()),
            scraper_metadata: Set(Some(point.metadata.clone())),
            ..Default::default()
        };

        price_history::Entity::insert(active)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn get_price_history(
        &self,
        product_url_id: i32,
        limit: u64,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError> {
        let rows = price_history::Entity::find()
            .filter(price_history::Column::ProductUrlId.eq(product_url_id))
            .order_by_desc(price_history::Column::ScrapedAt)
            .order_by_desc(price_history::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(PriceHistoryEntry::from).collect())
    }

    async fn get_latest_price(
        &self,
        product_url_id: i32,
    ) -> Result<Option<PriceHistoryEntry>, RepositoryError> {
        Ok(price_history::Entity::find()
            .filter(price_history::Column::ProductUrlId.eq(product_url_id))
            .order_by_desc(price_history::Column::ScrapedAt)
            .order_by_desc(price_history::Column::Id)
            .one(self.db.as_ref())
            .await?
            .map(PriceHistoryEntry::from))
    }

    async fn get_active_product_urls(
        &self,
        site_id: Option<i32>,
    ) -> Result<Vec<TrackedUrl>, RepositoryError> {
        let mut query =
            product_url::Entity::find().filter(product_url::Column::IsActive.eq(true));
        if let Some(site_id) = site_id {
            query = query.filter(product_url::Column::SiteId.eq(site_id));
        }
        let rows = query
            .order_by_asc(product_url::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(TrackedUrl::from).collect())
    }
}

#[async_trait]
impl ScrapingSessionRepository for SeaOrmPriceRepository {
    async fn open_session(
        &self,
        session_id: Uuid,
        metadata: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let active = scraping_session::ActiveModel {
            session_id: Set(session_id.to_string()),
            started_at: Set(Utc::now().into()),
            completed_at: Set(None),
            status: Set(SessionStatus::Running.to_string()),
            products_scraped: Set(0),
            errors_count: Set(0),
            session_metadata: Set(Some(metadata)),
            ..Default::default()
        };

        scraping_session::Entity::insert(active)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn close_session(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        products_scraped: u64,
        errors_count: u64,
    ) -> Result<(), RepositoryError> {
        let session = self.find_session(session_id).await?;

        let mut active: scraping_session::ActiveModel = session.into();
        active.status = Set(status.to_string());
        active.completed_at = Set(Some(Utc::now().into()));
        active.products_scraped = Set(to_i32(products_scraped));
        active.errors_count = Set(to_i32(errors_count));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn record_error(
        &self,
        session_id: Uuid,
        error_type: &str,
        message: &str,
        url: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let session = self.find_session(session_id).await?;

        let product_url_id = match url {
            Some(url) => product_url::Entity::find()
                .filter(product_url::Column::Url.eq(url))
                .one(self.db.as_ref())
                .await?
                .map(|m| m.id),
            None => None,
        };

        let active = scraping_error::ActiveModel {
            session_id: Set(session.id),
            product_url_id: Set(product_url_id),
            url: Set(url.map(str::to_string)),
            error_type: Set(error_type.to_string()),
            error_message: Set(message.to_string()),
            occurred_at: Set(Utc::now().into()),
            resolved: Set(false),
            ..Default::default()
        };

        scraping_error::Entity::insert(active)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
