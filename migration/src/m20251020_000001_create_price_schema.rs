// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 价格监控基础模式迁移
///
/// 创建站点、商品、商品URL和价格历史四张表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    /// 应用数据库迁移
    ///
    /// # 参数
    ///
    /// * `manager` - 数据库模式管理器
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 迁移成功
    /// * `Err(DbErr)` - 迁移失败
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. sites (No dependencies)
        manager
            .create_table(
                Table::create()
                    .table(Sites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sites::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sites::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Sites::BaseUrl).string().not_null())
                    .col(ColumnDef::new(Sites::ScraperType).string().not_null())
                    .col(
                        ColumnDef::new(Sites::RateLimit)
                            .double()
                            .not_null()
                            .default(2.0),
                    )
                    .col(
                        ColumnDef::new(Sites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 2. products (No dependencies)
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Category).string().not_null())
                    .col(ColumnDef::new(Products::Brand).string().null())
                    .col(ColumnDef::new(Products::Model).string().null())
                    .col(
                        ColumnDef::new(Products::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_product_identity")
                    .table(Products::Table)
                    .col(Products::Name)
                    .col(Products::Brand)
                    .col(Products::Model)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_category")
                    .table(Products::Table)
                    .col(Products::Category)
                    .to_owned(),
            )
            .await?;

        // 3. product_urls (Depends on products, sites)
        manager
            .create_table(
                Table::create()
                    .table(ProductUrls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductUrls::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProductUrls::ProductId).integer().not_null())
                    .col(ColumnDef::new(ProductUrls::SiteId).integer().not_null())
                    .col(ColumnDef::new(ProductUrls::Url).text().not_null())
                    .col(ColumnDef::new(ProductUrls::SelectorConfig).text().null())
                    .col(
                        ColumnDef::new(ProductUrls::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ProductUrls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_urls_product")
                            .from(ProductUrls::Table, ProductUrls::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_urls_site")
                            .from(ProductUrls::Table, ProductUrls::SiteId)
                            .to(Sites::Table, Sites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_product_site")
                    .table(ProductUrls::Table)
                    .col(ProductUrls::ProductId)
                    .col(ProductUrls::SiteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 4. price_history (Depends on product_urls)
        manager
            .create_table(
                Table::create()
                    .table(PriceHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceHistory::ProductUrlId).integer().not_null())
                    .col(ColumnDef::new(PriceHistory::Price).double().null())
                    .col(
                        ColumnDef::new(PriceHistory::Currency)
                            .string_len(3)
                            .not_null()
                            .default("USD"),
                    )
                    .col(ColumnDef::new(PriceHistory::Availability).string().null())
                    .col(
                        ColumnDef::new(PriceHistory::ScrapedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PriceHistory::ScraperMetadata).json().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_price_history_product_url")
                            .from(PriceHistory::Table, PriceHistory::ProductUrlId)
                            .to(ProductUrls::Table, ProductUrls::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_price_history_scraped_at")
                    .table(PriceHistory::Table)
                    .col(PriceHistory::ProductUrlId)
                    .col(PriceHistory::ScrapedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductUrls::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sites::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Sites {
    Table,
    Id,
    Name,
    BaseUrl,
    ScraperType,
    RateLimit,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Category,
    Brand,
    Model,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum ProductUrls {
    Table,
    Id,
    ProductId,
    SiteId,
    Url,
    SelectorConfig,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PriceHistory {
    Table,
    Id,
    ProductUrlId,
    Price,
    Currency,
    Availability,
    ScrapedAt,
    ScraperMetadata,
}
