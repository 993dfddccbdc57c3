// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::product::{PriceHistoryEntry, PricePoint, TrackedUrl};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 数据不合法
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// 价格仓库特质
///
/// 持久化存储契约。站点、商品和商品URL均为查找或创建语义，
/// 实现方负责自身写入的串行化与事务
#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// 查找或创建站点，返回站点ID
    async fn upsert_site(
        &self,
        name: &str,
        base_url: &str,
        kind: &str,
        rate_limit: f64,
    ) -> Result<i32, RepositoryError>;

    /// 查找或创建商品，返回商品ID
    async fn upsert_product(
        &self,
        name: &str,
        category: &str,
        brand: Option<&str>,
        model: Option<&str>,
    ) -> Result<i32, RepositoryError>;

    /// 查找或创建商品在某站点上的URL，返回URL ID
    async fn upsert_product_url(
        &self,
        product_id: i32,
        site_id: i32,
        url: &str,
    ) -> Result<i32, RepositoryError>;

    /// 写入一条价格记录
    async fn insert_price_point(
        &self,
        product_url_id: i32,
        point: &PricePoint,
    ) -> Result<(), RepositoryError>;

    /// 查询商品URL的价格历史，按抓取时间从新到旧，最多 `limit` 条
    async fn get_price_history(
        &self,
        product_url_id: i32,
        limit: u64,
    ) -> Result<Vec<PriceHistoryEntry>, RepositoryError>;

    /// 查询商品URL的最新价格
    async fn get_latest_price(
        &self,
        product_url_id: i32,
    ) -> Result<Option<PriceHistoryEntry>, RepositoryError>;

    /// 查询所有启用的商品URL，可按站点过滤
    async fn get_active_product_urls(
        &self,
        site_id: Option<i32>,
    ) -> Result<Vec<TrackedUrl>, RepositoryError>;
}
