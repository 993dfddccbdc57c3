// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::outcome::{FailureKind, JobFailure};
use crate::domain::models::product::ProductRecord;

/// 站点适配器错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// 网络错误（连接失败、非成功状态码等）
    #[error("Network error: {0}")]
    Network(String),
    /// 页面内容与预期结构不符
    #[error("Parsing error: {0}")]
    Parsing(String),
    /// 请求超时
    #[error("Timeout: {0}")]
    Timeout(String),
    /// 没有为该站点注册适配器
    #[error("Unsupported site: {0}")]
    UnsupportedSite(String),
}

impl AdapterError {
    /// 错误分类
    pub fn kind(&self) -> FailureKind {
        match self {
            AdapterError::Network(_) => FailureKind::Network,
            AdapterError::Parsing(_) => FailureKind::Parsing,
            AdapterError::Timeout(_) => FailureKind::Timeout,
            AdapterError::UnsupportedSite(_) => FailureKind::UnsupportedSite,
        }
    }
}

impl From<AdapterError> for JobFailure {
    fn from(err: AdapterError) -> Self {
        JobFailure::new(err.kind(), err.to_string())
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(err.to_string())
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}

/// 站点适配器特质
///
/// 给定商品URL，抓取页面并抽取结构化商品记录
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// 抓取并抽取商品记录
    async fn fetch_and_extract(&self, url: &str) -> Result<ProductRecord, AdapterError>;

    /// 适配器名称
    fn name(&self) -> &str;
}

/// 页面渲染策略
///
/// 静态页面直接请求，需要浏览器的站点可以注入其他实现
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// 获取页面 HTML
    async fn render(&self, url: &str) -> Result<String, AdapterError>;

    /// 渲染方式名称
    fn kind(&self) -> &'static str;
}
