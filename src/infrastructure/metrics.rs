// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::info;

/// 指标导出错误
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid metrics address '{0}'")]
    InvalidAddress(String),
    #[error("Failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// 安装 Prometheus 记录器并在 `addr` 上暴露 HTTP 端点
///
/// 端口被占用或重复安装时返回错误，由调用方决定是否继续运行
pub fn init_metrics(addr: &str) -> Result<(), MetricsError> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|_| MetricsError::InvalidAddress(addr.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "scrape_jobs_queued_total",
        Unit::Count,
        "Jobs accepted into the queue"
    );
    describe_counter!(
        "scrape_jobs_completed_total",
        Unit::Count,
        "Jobs that produced a validated product record"
    );
    describe_counter!(
        "scrape_jobs_failed_total",
        Unit::Count,
        "Jobs that failed after exhausting retries"
    );
    describe_counter!(
        "scrape_jobs_retried_total",
        Unit::Count,
        "Failed attempts that were requeued"
    );
    describe_counter!(
        "scrape_jobs_rate_limited_total",
        Unit::Count,
        "Dispatch attempts deferred by a site rate limit"
    );
    describe_counter!(
        "scrape_persistence_failures_total",
        Unit::Count,
        "Successful jobs whose product data could not be stored"
    );
    describe_gauge!(
        "scrape_jobs_active",
        Unit::Count,
        "Jobs queued or in flight that have not reached a terminal state"
    );
    describe_histogram!(
        "scrape_job_duration_seconds",
        Unit::Seconds,
        "Processing time of successful jobs"
    );
}
