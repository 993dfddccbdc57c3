// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

use crate::m20251020_000001_create_price_schema::ProductUrls;

/// 抓取会话与错误日志迁移
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScrapingSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScrapingSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScrapingSessions::SessionId)
                            .string_len(36)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ScrapingSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScrapingSessions::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ScrapingSessions::Status).string().not_null())
                    .col(
                        ColumnDef::new(ScrapingSessions::ProductsScraped)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScrapingSessions::ErrorsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ScrapingSessions::SessionMetadata).json().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScrapingErrors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScrapingErrors::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScrapingErrors::SessionId).integer().not_null())
                    .col(ColumnDef::new(ScrapingErrors::ProductUrlId).integer().null())
                    .col(ColumnDef::new(ScrapingErrors::Url).text().null())
                    .col(ColumnDef::new(ScrapingErrors::ErrorType).string().not_null())
                    .col(ColumnDef::new(ScrapingErrors::ErrorMessage).text().not_null())
                    .col(
                        ColumnDef::new(ScrapingErrors::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScrapingErrors::Resolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scraping_errors_session")
                            .from(ScrapingErrors::Table, ScrapingErrors::SessionId)
                            .to(ScrapingSessions::Table, ScrapingSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scraping_errors_product_url")
                            .from(ScrapingErrors::Table, ScrapingErrors::ProductUrlId)
                            .to(ProductUrls::Table, ProductUrls::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scraping_error_type")
                    .table(ScrapingErrors::Table)
                    .col(ScrapingErrors::ErrorType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScrapingErrors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScrapingSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScrapingSessions {
    Table,
    Id,
    SessionId,
    StartedAt,
    CompletedAt,
    Status,
    ProductsScraped,
    ErrorsCount,
    SessionMetadata,
}

#[derive(DeriveIden)]
enum ScrapingErrors {
    Table,
    Id,
    SessionId,
    ProductUrlId,
    Url,
    ErrorType,
    ErrorMessage,
    OccurredAt,
    Resolved,
}
