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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::config::provider::{seconds_to_duration, ScrapingConfigProvider};
use crate::domain::services::validator::ValidationRules;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::pool::ExecutionMode;

/// 应用程序配置设置
///
/// 包含抓取、重试、数据库、数据校验、指标和站点等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 抓取调度配置
    pub scraping: ScrapingSettings,
    /// 重试策略配置
    pub retry: RetrySettings,
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 数据校验规则
    #[serde(default)]
    pub validation: ValidationRules,
    /// 指标导出配置
    pub metrics: MetricsSettings,
    /// 站点配置，键为站点标识
    #[serde(default)]
    pub sites: HashMap<String, SiteSettings>,
}

/// 抓取调度配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapingSettings {
    /// 并发工作者数量
    pub concurrent_workers: usize,
    /// 执行模式 (shared, dedicated)
    pub execution_mode: ExecutionMode,
    /// 未单独配置的站点使用的最小请求间隔（秒）
    pub default_rate_limit: f64,
    /// 调度器出队等待时间（毫秒）
    pub dequeue_timeout_ms: u64,
    /// 限流时调度器的让步时间（毫秒）
    pub rate_limit_backoff_ms: u64,
    /// 等待完成时的轮询间隔（毫秒）
    pub completion_poll_ms: u64,
    /// 单个页面请求超时（秒）
    pub request_timeout_secs: u64,
    /// 停止时等待执行中任务的时间（秒）
    pub stop_timeout_secs: u64,
    /// 命令行运行时等待全部任务完成的时间（秒）
    pub completion_timeout_secs: Option<u64>,
    /// 请求使用的 User-Agent
    pub user_agent: String,
}

/// 重试策略配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// 最大重试次数
    pub max_retries: u32,
    /// 重试任务的优先级偏移
    pub retry_priority_offset: i32,
    /// 退避时间表（秒）
    pub backoff_schedule_secs: Vec<f64>,
    /// 抖动因子
    pub jitter_factor: f64,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 指标导出配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 导出监听地址
    pub listen_address: String,
}

/// 单个站点的配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteSettings {
    /// 站点根地址
    pub base_url: Option<String>,
    /// 抓取方式 (static, browser)
    pub kind: Option<String>,
    /// 最小请求间隔（秒）
    pub rate_limit: Option<f64>,
    /// 价格货币
    pub currency: Option<String>,
    /// 商品分类
    pub category: Option<String>,
    /// 站点别名
    #[serde(default)]
    pub aliases: Vec<String>,
    /// CSS 选择器
    #[serde(default)]
    pub selectors: HashMap<String, String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从 `config/` 目录和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// 从指定目录加载配置
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Scraping defaults
            .set_default("scraping.concurrent_workers", 3)?
            .set_default("scraping.execution_mode", "shared")?
            .set_default("scraping.default_rate_limit", 2.0)?
            .set_default("scraping.dequeue_timeout_ms", 1000)?
            .set_default("scraping.rate_limit_backoff_ms", 100)?
            .set_default("scraping.completion_poll_ms", 100)?
            .set_default("scraping.request_timeout_secs", 30)?
            .set_default("scraping.stop_timeout_secs", 30)?
            .set_default(
                "scraping.user_agent",
                concat!("pricewatch/", env!("CARGO_PKG_VERSION")),
            )?
            // Retry defaults
            .set_default("retry.max_retries", 3)?
            .set_default("retry.retry_priority_offset", 10)?
            .set_default("retry.backoff_schedule_secs", vec![1.0, 2.0, 4.0])?
            .set_default("retry.jitter_factor", 0.0)?
            // Default DB settings
            .set_default("database.url", "sqlite://pricewatch.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Metrics
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_address", "0.0.0.0:9000")?
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(&env)).required(false))
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.scraping.concurrent_workers == 0 {
            return Err(ConfigError::Message(
                "scraping.concurrent_workers must be at least 1".to_string(),
            ));
        }
        if !self.scraping.default_rate_limit.is_finite() || self.scraping.default_rate_limit < 0.0
        {
            return Err(ConfigError::Message(
                "scraping.default_rate_limit must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// 查找站点配置，站点标识和别名都不区分大小写
    pub fn site(&self, site: &str) -> Option<&SiteSettings> {
        self.site_entry(site).map(|(_, s)| s)
    }

    fn site_entry(&self, site: &str) -> Option<(&String, &SiteSettings)> {
        self.sites.get_key_value(site).or_else(|| {
            self.sites.iter().find(|(name, s)| {
                name.eq_ignore_ascii_case(site)
                    || s.aliases.iter().any(|a| a.eq_ignore_ascii_case(site))
            })
        })
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.scraping.dequeue_timeout_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.scraping.rate_limit_backoff_ms)
    }

    pub fn completion_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scraping.completion_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scraping.request_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.scraping.stop_timeout_secs)
    }
}

impl ScrapingConfigProvider for Settings {
    fn rate_limit(&self, site: &str) -> Duration {
        let secs = self
            .site(site)
            .and_then(|s| s.rate_limit)
            .unwrap_or(self.scraping.default_rate_limit);
        seconds_to_duration(secs)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            retry_priority_offset: self.retry.retry_priority_offset,
            backoff_schedule: self
                .retry
                .backoff_schedule_secs
                .iter()
                .copied()
                .map(seconds_to_duration)
                .collect(),
            jitter_factor: self.retry.jitter_factor,
        }
    }

    fn worker_count(&self) -> usize {
        self.scraping.concurrent_workers
    }

    fn site_base_url(&self, site: &str) -> String {
        self.site(site)
            .and_then(|s| s.base_url.clone())
            .unwrap_or_else(|| format!("https://www.{}.com", site))
    }

    fn site_kind(&self, site: &str) -> String {
        self.site(site)
            .and_then(|s| s.kind.clone())
            .unwrap_or_else(|| "static".to_string())
    }

    fn canonical_site(&self, site: &str) -> String {
        self.site_entry(site)
            .map(|(name, _)| name.as_str())
            .unwrap_or(site)
            .to_lowercase()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
