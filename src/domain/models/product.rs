// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 未指定分类时使用的商品分类
pub const DEFAULT_CATEGORY: &str = "electronics";

/// 默认货币
pub const DEFAULT_CURRENCY: &str = "USD";

/// 商品记录
///
/// 站点适配器从商品页面中提取出的结构化数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// 商品页面URL
    pub url: String,
    /// 商品标题
    pub title: String,
    /// 价格，页面未展示价格时为空
    pub price: Option<f64>,
    /// 货币代码
    pub currency: String,
    /// 库存状态
    pub availability: Option<String>,
    /// 品牌
    pub brand: Option<String>,
    /// 型号
    pub model: Option<String>,
    /// 商品图片
    pub image_url: Option<String>,
    /// 评分 (0-5)
    pub rating: Option<f64>,
    /// 评论数量
    pub reviews_count: Option<u32>,
    /// 抓取时间
    pub scraped_at: DateTime<Utc>,
    /// 附加元数据（站点、分类、抽取信息等）
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ProductRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            price: None,
            currency: DEFAULT_CURRENCY.to_string(),
            availability: None,
            brand: None,
            model: None,
            image_url: None,
            rating: None,
            reviews_count: None,
            scraped_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_availability(mut self, availability: impl Into<String>) -> Self {
        self.availability = Some(availability.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 商品分类，取自元数据，缺省为 `electronics`
    pub fn category(&self) -> &str {
        self.metadata
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }

    /// 生成价格点，无价格时返回 `None`
    pub fn price_point(&self) -> Option<PricePoint> {
        self.price.map(|price| PricePoint {
            price,
            currency: self.currency.clone(),
            availability: self.availability.clone(),
            scraped_at: self.scraped_at,
            metadata: Value::Object(self.metadata.clone()),
        })
    }
}

/// 价格点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub currency: String,
    pub availability: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub metadata: Value,
}

/// 已存储的价格历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: i32,
    pub product_url_id: i32,
    pub price: Option<f64>,
    pub currency: String,
    pub availability: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub metadata: Option<Value>,
}

/// 处于跟踪状态的商品URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedUrl {
    pub id: i32,
    pub product_id: i32,
    pub site_id: i32,
    pub url: String,
}
