// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::models::outcome::{FailureKind, JobFailure};
use crate::domain::models::product::ProductRecord;

/// 数据校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed on {field}: {reason}")]
pub struct ValidationError {
    /// 未通过校验的字段
    pub field: String,
    /// 失败原因
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for JobFailure {
    fn from(err: ValidationError) -> Self {
        JobFailure::new(FailureKind::Validation, err.to_string())
    }
}

/// 商品数据校验器
///
/// 接收原始商品记录，返回清洗后的记录或校验错误
pub trait ProductValidator: Send + Sync {
    fn validate(&self, record: ProductRecord) -> Result<ProductRecord, ValidationError>;
}

/// 数据校验规则
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub title_min_length: usize,
    pub title_max_length: usize,
    pub price_min: f64,
    pub price_max: f64,
    pub valid_statuses: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            title_min_length: 3,
            title_max_length: 500,
            price_min: 0.01,
            price_max: 10_000.0,
            valid_statuses: vec![
                "in_stock".to_string(),
                "out_of_stock".to_string(),
                "limited".to_string(),
                "unknown".to_string(),
            ],
        }
    }
}

/// 基于规则的校验器
///
/// 先规范化（标题空白、库存状态、评分范围），再按规则校验，
/// 返回第一个未通过的字段
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    rules: ValidationRules,
}

impl RuleValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    fn normalize(&self, mut record: ProductRecord) -> ProductRecord {
        record.title = record.title.split_whitespace().collect::<Vec<_>>().join(" ");

        record.availability = record
            .availability
            .take()
            .map(|raw| self.normalize_availability(&raw));

        if let Some(rating) = record.rating {
            if !(0.0..=5.0).contains(&rating) {
                record.rating = None;
            }
        }

        record
    }

    fn normalize_availability(&self, raw: &str) -> String {
        let status = raw.trim();
        if status.is_empty() {
            return "unknown".to_string();
        }
        if self.rules.valid_statuses.iter().any(|s| s == status) {
            return status.to_string();
        }

        let lower = status.to_lowercase();
        // "unavailable" 包含 "available"，缺货判断必须在前
        if ["out of stock", "unavailable", "sold out"]
            .iter()
            .any(|term| lower.contains(term))
        {
            "out_of_stock".to_string()
        } else if ["in stock", "available", "ships", "add to cart"]
            .iter()
            .any(|term| lower.contains(term))
        {
            "in_stock".to_string()
        } else if lower.contains("limited") {
            "limited".to_string()
        } else {
            "unknown".to_string()
        }
    }

    fn check(&self, record: &ProductRecord) -> Result<(), ValidationError> {
        let title_len = record.title.chars().count();
        if title_len == 0 {
            return Err(ValidationError::new("title", "title is missing"));
        }
        if title_len < self.rules.title_min_length {
            return Err(ValidationError::new(
                "title",
                format!("title is too short (min: {})", self.rules.title_min_length),
            ));
        }
        if title_len > self.rules.title_max_length {
            return Err(ValidationError::new(
                "title",
                format!("title is too long (max: {})", self.rules.title_max_length),
            ));
        }

        if let Some(price) = record.price {
            if !(self.rules.price_min..=self.rules.price_max).contains(&price) {
                return Err(ValidationError::new(
                    "price",
                    format!("price is out of range ({})", price),
                ));
            }
        }

        if let Some(availability) = &record.availability {
            if !self.rules.valid_statuses.iter().any(|s| s == availability) {
                return Err(ValidationError::new(
                    "availability",
                    format!("invalid availability status: {}", availability),
                ));
            }
        }

        Ok(())
    }
}

impl ProductValidator for RuleValidator {
    fn validate(&self, record: ProductRecord) -> Result<ProductRecord, ValidationError> {
        let record = self.normalize(record);
        self.check(&record)?;
        Ok(record)
    }
}
