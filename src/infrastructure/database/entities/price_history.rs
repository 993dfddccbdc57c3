// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "price_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_url_id: i32,
    #[sea_orm(column_type = "Double", nullable)]
    pub price: Option<f64>,
    pub currency: String,
    pub availability: Option<String>,
    pub scraped_at: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Json", nullable)]
    pub scraper_metadata: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
