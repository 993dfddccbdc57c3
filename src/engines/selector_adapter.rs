// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::product::{ProductRecord, DEFAULT_CURRENCY};
use crate::engines::traits::{AdapterError, PageRenderer, SiteAdapter};

static PRICE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("Failed to compile price regex"));

static RATING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("Failed to compile rating regex"));

static COUNT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*").expect("Failed to compile count regex"));

/// 站点 CSS 选择器配置
///
/// 只有标题选择器是必需的，其余字段缺省时跳过对应字段
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub title: String,
    pub price: Option<String>,
    pub availability: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub image: Option<String>,
    pub rating: Option<String>,
    pub reviews: Option<String>,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            title: "h1".to_string(),
            price: None,
            availability: None,
            brand: None,
            model: None,
            image: None,
            rating: None,
            reviews: None,
        }
    }
}

impl SiteSelectors {
    /// 从配置中的键值表构建
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned();
        Self {
            title: get("title").unwrap_or_else(|| "h1".to_string()),
            price: get("price"),
            availability: get("availability"),
            brand: get("brand"),
            model: get("model"),
            image: get("image"),
            rating: get("rating"),
            reviews: get("reviews"),
        }
    }
}

#[derive(Debug)]
struct CompiledSelectors {
    title: Selector,
    price: Option<Selector>,
    availability: Option<Selector>,
    brand: Option<Selector>,
    model: Option<Selector>,
    image: Option<Selector>,
    rating: Option<Selector>,
    reviews: Option<Selector>,
}

fn compile(field: &str, css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css)
        .map_err(|e| AdapterError::Parsing(format!("Invalid {} selector '{}': {}", field, css, e)))
}

fn compile_opt(field: &str, css: &Option<String>) -> Result<Option<Selector>, AdapterError> {
    css.as_deref().map(|c| compile(field, c)).transpose()
}

impl CompiledSelectors {
    fn new(selectors: &SiteSelectors) -> Result<Self, AdapterError> {
        Ok(Self {
            title: compile("title", &selectors.title)?,
            price: compile_opt("price", &selectors.price)?,
            availability: compile_opt("availability", &selectors.availability)?,
            brand: compile_opt("brand", &selectors.brand)?,
            model: compile_opt("model", &selectors.model)?,
            image: compile_opt("image", &selectors.image)?,
            rating: compile_opt("rating", &selectors.rating)?,
            reviews: compile_opt("reviews", &selectors.reviews)?,
        })
    }
}

/// 基于 CSS 选择器的站点适配器
///
/// 渲染策略作为依赖注入，适配器本身只负责字段抽取
pub struct SelectorAdapter {
    site: String,
    currency: String,
    category: Option<String>,
    renderer: Arc<dyn PageRenderer>,
    selectors: CompiledSelectors,
}

impl SelectorAdapter {
    /// 创建新的适配器
    ///
    /// 选择器在此处编译，非法选择器会直接返回错误
    pub fn new(
        site: impl Into<String>,
        renderer: Arc<dyn PageRenderer>,
        selectors: &SiteSelectors,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            site: site.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            category: None,
            renderer,
            selectors: CompiledSelectors::new(selectors)?,
        })
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// 从 HTML 中抽取商品记录
    pub fn extract(&self, html: &str, url: &str) -> Result<ProductRecord, AdapterError> {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.selectors.title)
            .ok_or_else(|| AdapterError::Parsing(format!("No title found on {}", url)))?;

        let mut record = ProductRecord::new(url, title);
        record.currency = self.currency.clone();
        record.price = self
            .selectors
            .price
            .as_ref()
            .and_then(|s| first_text(&document, s))
            .and_then(|text| parse_price(&text));
        record.availability = select_text(&document, &self.selectors.availability);
        record.brand = select_text(&document, &self.selectors.brand);
        record.model = select_text(&document, &self.selectors.model);
        record.image_url = self.selectors.image.as_ref().and_then(|s| {
            document
                .select(s)
                .next()
                .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("content")))
                .map(str::to_string)
        });
        record.rating = select_text(&document, &self.selectors.rating)
            .and_then(|text| parse_rating(&text));
        record.reviews_count = select_text(&document, &self.selectors.reviews)
            .and_then(|text| parse_count(&text));

        record.scraped_at = Utc::now();
        let extracted_at = record.scraped_at.to_rfc3339();
        record = record
            .with_metadata("site", self.site.clone())
            .with_metadata("extraction_method", self.renderer.kind())
            .with_metadata("extracted_at", extracted_at);
        if let Some(category) = &self.category {
            record = record.with_metadata("category", category.clone());
        }

        Ok(record)
    }
}

#[async_trait]
impl SiteAdapter for SelectorAdapter {
    async fn fetch_and_extract(&self, url: &str) -> Result<ProductRecord, AdapterError> {
        let html = self.renderer.render(url).await?;
        self.extract(&html, url)
    }

    fn name(&self) -> &str {
        &self.site
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn select_text(document: &Html, selector: &Option<Selector>) -> Option<String> {
    selector.as_ref().and_then(|s| first_text(document, s))
}

/// 从价格文本中解析数值，千分位逗号会被忽略
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    PRICE_REGEX
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn parse_rating(text: &str) -> Option<f64> {
    RATING_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn parse_count(text: &str) -> Option<u32> {
    COUNT_REGEX
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse::<u32>().ok())
}
