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

use crate::engines::traits::{AdapterError, PageRenderer};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; pricewatch/0.1)";

/// 静态页面渲染器
///
/// 基于 reqwest 实现，客户端在构造时创建并在所有请求间复用
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    /// 创建新的渲染器
    ///
    /// # 参数
    ///
    /// * `timeout` - 单次请求超时
    /// * `user_agent` - 请求使用的 User-Agent，为空时使用默认值
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// 使用已有客户端创建渲染器
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<String, AdapterError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Network(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response.text().await?;
        debug!(
            url = %url,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Page fetched"
        );
        Ok(body)
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
#[path = "http_renderer_test.rs"]
mod tests;
