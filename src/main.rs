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

use anyhow::{bail, Context};
use pricewatch::config::settings::Settings;
use pricewatch::domain::models::job::JobRequest;
use pricewatch::domain::services::validator::RuleValidator;
use pricewatch::engines::registry::AdapterRegistry;
use pricewatch::infrastructure::database::connection;
use pricewatch::infrastructure::repositories::SeaOrmPriceRepository;
use pricewatch::workers::{ManagerOptions, ScrapingManager};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use pricewatch::utils::telemetry;

/// 读取任务文件，支持 YAML 和 JSON
fn load_jobs(path: &Path) -> anyhow::Result<Vec<JobRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read jobs file {}", path.display()))?;

    let jobs = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        _ => bail!("unsupported jobs file {}, expected .yaml or .json", path.display()),
    };
    Ok(jobs)
}

/// 主函数
///
/// 加载配置和任务文件，运行一次抓取会话并输出统计快照
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();

    let Some(jobs_path) = std::env::args().nth(1) else {
        bail!("usage: pricewatch <jobs.yaml|jobs.json>");
    };
    let jobs = load_jobs(Path::new(&jobs_path))?;
    info!("Starting pricewatch with {} jobs from {}", jobs.len(), jobs_path);

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    if settings.metrics.enabled {
        if let Err(e) =
            pricewatch::infrastructure::metrics::init_metrics(&settings.metrics.listen_address)
        {
            warn!("Metrics exporter disabled: {}", e);
        }
    }

    // 3. Connect to database and apply migrations
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database ready");

    // 4. Build adapters and validator
    let registry = Arc::new(AdapterRegistry::from_settings(&settings)?);
    info!("Registered adapters: {:?}", registry.sites());
    let validator = Arc::new(RuleValidator::new(settings.validation.clone()));
    let repository = Arc::new(SeaOrmPriceRepository::new(db));

    // 5. Run the session
    let manager = ScrapingManager::new(
        settings.clone(),
        registry,
        validator,
        repository.clone(),
    )
    .with_options(ManagerOptions::from_settings(&settings))
    .with_session_repository(repository);

    manager.add_bulk_jobs(jobs)?;
    manager.start().await?;

    let completion_timeout = settings
        .scraping
        .completion_timeout_secs
        .map(Duration::from_secs);
    if !manager.wait_completion(completion_timeout).await {
        warn!("Completion timeout reached, stopping with jobs outstanding");
    }
    manager.stop(settings.stop_timeout()).await?;

    let snapshot = manager.statistics();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
