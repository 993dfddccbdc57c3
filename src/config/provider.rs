// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::time::Duration;

use crate::utils::retry_policy::RetryPolicy;

/// 抓取配置提供者
///
/// 管理器通过该接口读取站点限流、重试策略和工作者数量，
/// 既可以由 [`Settings`](crate::config::settings::Settings) 提供，也可以在测试中注入固定值
pub trait ScrapingConfigProvider: Send + Sync {
    /// 站点的最小请求间隔
    fn rate_limit(&self, site: &str) -> Duration;

    /// 重试策略
    fn retry_policy(&self) -> RetryPolicy;

    /// 工作者数量
    fn worker_count(&self) -> usize;

    /// 站点根地址
    fn site_base_url(&self, site: &str) -> String {
        format!("https://www.{}.com", site)
    }

    /// 站点抓取方式
    fn site_kind(&self, _site: &str) -> String {
        "static".to_string()
    }

    /// 站点的规范标识
    ///
    /// 别名解析为所属站点，结果统一小写。限流状态、统计和持久化都以此为键
    fn canonical_site(&self, site: &str) -> String {
        site.to_lowercase()
    }
}

/// 秒数转换为 Duration，非法值按 0 处理
pub(crate) fn seconds_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// 固定值配置提供者
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    default_rate_limit: Duration,
    site_rate_limits: HashMap<String, Duration>,
    site_aliases: HashMap<String, String>,
    retry_policy: RetryPolicy,
    worker_count: usize,
}

impl Default for StaticConfigProvider {
    fn default() -> Self {
        Self {
            default_rate_limit: Duration::from_secs(2),
            site_rate_limits: HashMap::new(),
            site_aliases: HashMap::new(),
            retry_policy: RetryPolicy::default(),
            worker_count: 3,
        }
    }
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_rate_limit(mut self, interval: Duration) -> Self {
        self.default_rate_limit = interval;
        self
    }

    pub fn with_site_rate_limit(mut self, site: impl Into<String>, interval: Duration) -> Self {
        self.site_rate_limits
            .insert(site.into().to_lowercase(), interval);
        self
    }

    /// 注册站点别名
    pub fn with_site_alias(mut self, alias: impl Into<String>, site: impl Into<String>) -> Self {
        self.site_aliases
            .insert(alias.into().to_lowercase(), site.into().to_lowercase());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers.max(1);
        self
    }
}

impl ScrapingConfigProvider for StaticConfigProvider {
    fn rate_limit(&self, site: &str) -> Duration {
        self.site_rate_limits
            .get(&self.canonical_site(site))
            .copied()
            .unwrap_or(self.default_rate_limit)
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.clone()
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn canonical_site(&self, site: &str) -> String {
        let key = site.to_lowercase();
        self.site_aliases.get(&key).cloned().unwrap_or(key)
    }
}
