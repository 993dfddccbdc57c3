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

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::provider::ScrapingConfigProvider;

/// 单个站点的限流状态
#[derive(Debug)]
struct SiteRateState {
    /// 最小请求间隔
    min_interval: Duration,
    /// 上一次放行时间
    last_dispatch: Option<Instant>,
}

impl SiteRateState {
    fn remaining(&self, now: Instant) -> Duration {
        match self.last_dispatch {
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

/// 每站点限流器
///
/// 为每个站点维护独立的状态锁，不同站点之间互不阻塞；
/// 同一站点的检查与记录在同一把锁内完成。
#[derive(Clone)]
pub struct SiteRateLimiter {
    /// 存储每个站点的限流状态
    sites: Arc<DashMap<String, Arc<Mutex<SiteRateState>>>>,
    /// 站点间隔配置
    config: Arc<dyn ScrapingConfigProvider>,
}

impl SiteRateLimiter {
    /// 创建新的限流器
    ///
    /// # 参数
    ///
    /// * `config` - 提供每个站点最小请求间隔的配置
    pub fn new(config: Arc<dyn ScrapingConfigProvider>) -> Self {
        Self {
            sites: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 尝试为站点获取一次放行
    ///
    /// 距离上次放行不少于最小间隔时记录当前时间并返回 `true`，
    /// 否则返回 `false` 且不修改状态。首次请求总是放行
    pub fn try_acquire(&self, site: &str) -> bool {
        let state = self.get_or_create(site);
        let mut state = state.lock();
        let now = Instant::now();

        if state.remaining(now).is_zero() {
            state.last_dispatch = Some(now);
            true
        } else {
            false
        }
    }

    /// 站点在限流器中的键，别名与所属站点共享同一状态
    pub fn site_key(&self, site: &str) -> String {
        self.config.canonical_site(site)
    }

    /// 距离站点下次可放行的剩余时间
    pub fn time_until_ready(&self, site: &str) -> Duration {
        match self.sites.get(&self.site_key(site)) {
            Some(state) => state.lock().remaining(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// 获取或创建站点状态，间隔只在首次创建时读取一次
    fn get_or_create(&self, site: &str) -> Arc<Mutex<SiteRateState>> {
        let key = self.site_key(site);
        if let Some(state) = self.sites.get(&key) {
            return state.clone();
        }
        self.sites
            .entry(key)
            .or_insert_with(|| {
                Arc::new(Mutex::new(SiteRateState {
                    min_interval: self.config.rate_limit(site),
                    last_dispatch: None,
                }))
            })
            .clone()
    }
}
