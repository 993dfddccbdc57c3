// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::settings::Settings;
use crate::engines::http_renderer::HttpRenderer;
use crate::engines::selector_adapter::{SelectorAdapter, SiteSelectors};
use crate::engines::traits::{AdapterError, PageRenderer, SiteAdapter};
use crate::utils::errors::ManagerError;

/// 站点适配器注册表
///
/// 以站点标识（不区分大小写）为键查找适配器
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册适配器
    pub fn with_adapter(mut self, site: &str, adapter: Arc<dyn SiteAdapter>) -> Self {
        self.register(site, adapter);
        self
    }

    pub fn register(&mut self, site: &str, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(site.to_lowercase(), adapter);
    }

    /// 为已注册站点添加别名，例如 `shop.ge` -> `shopge`
    pub fn register_alias(&mut self, alias: &str, site: &str) -> bool {
        match self.adapters.get(&site.to_lowercase()).cloned() {
            Some(adapter) => {
                self.adapters.insert(alias.to_lowercase(), adapter);
                true
            }
            None => false,
        }
    }

    /// 查找站点适配器
    pub fn get(&self, site: &str) -> Result<Arc<dyn SiteAdapter>, AdapterError> {
        self.adapters
            .get(&site.to_lowercase())
            .cloned()
            .ok_or_else(|| AdapterError::UnsupportedSite(site.to_string()))
    }

    /// 已注册的站点标识（包括别名），按字母排序
    pub fn sites(&self) -> Vec<String> {
        let mut sites: Vec<String> = self.adapters.keys().cloned().collect();
        sites.sort();
        sites
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// 根据配置为每个站点构建选择器适配器
    ///
    /// 所有站点共享同一个静态页面渲染器
    pub fn from_settings(settings: &Settings) -> Result<Self, ManagerError> {
        let renderer: Arc<dyn PageRenderer> = Arc::new(
            HttpRenderer::new(
                settings.request_timeout(),
                Some(settings.scraping.user_agent.as_str()),
            )
            .map_err(|e| ManagerError::Configuration(e.to_string()))?,
        );

        let mut registry = Self::new();
        for (site, site_settings) in &settings.sites {
            let selectors = SiteSelectors::from_map(&site_settings.selectors);
            let mut adapter = SelectorAdapter::new(site.clone(), renderer.clone(), &selectors)
                .map_err(|e| ManagerError::Configuration(format!("site '{}': {}", site, e)))?;
            if let Some(currency) = &site_settings.currency {
                adapter = adapter.with_currency(currency.clone());
            }
            if let Some(category) = &site_settings.category {
                adapter = adapter.with_category(category.clone());
            }
            registry.register(site, Arc::new(adapter));

            for alias in &site_settings.aliases {
                registry.register_alias(alias, site);
            }
        }

        info!("Adapter registry built for sites: {:?}", registry.sites());
        Ok(registry)
    }
}
