// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::provider::ScrapingConfigProvider;
use crate::domain::models::job::Job;
use crate::domain::models::outcome::{JobFailure, JobOutcome};
use crate::domain::models::product::ProductRecord;
use crate::domain::models::statistics::RunStatistics;
use crate::domain::repositories::price_repository::{PriceRepository, RepositoryError};
use crate::domain::repositories::session_repository::ScrapingSessionRepository;
use crate::queue::job_queue::JobQueue;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::halted;

/// 会话日志
#[derive(Clone)]
pub struct SessionJournal {
    pub repository: Arc<dyn ScrapingSessionRepository>,
    pub session_id: Uuid,
}

/// 结果收集器
///
/// 单一控制循环：消费工作者产生的结果，成功时持久化并计数，
/// 失败时按重试策略重新入队或记为终态失败
pub struct ResultCollector {
    results: mpsc::UnboundedReceiver<JobOutcome>,
    queue: Arc<JobQueue>,
    stats: Arc<RunStatistics>,
    store: Arc<dyn PriceRepository>,
    config: Arc<dyn ScrapingConfigProvider>,
    retry_policy: RetryPolicy,
    journal: Option<SessionJournal>,
    poll_interval: Duration,
    halt: watch::Receiver<bool>,
}

impl ResultCollector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        results: mpsc::UnboundedReceiver<JobOutcome>,
        queue: Arc<JobQueue>,
        stats: Arc<RunStatistics>,
        store: Arc<dyn PriceRepository>,
        config: Arc<dyn ScrapingConfigProvider>,
        journal: Option<SessionJournal>,
        poll_interval: Duration,
        halt: watch::Receiver<bool>,
    ) -> Self {
        let retry_policy = config.retry_policy();
        Self {
            results,
            queue,
            stats,
            store,
            config,
            retry_policy,
            journal,
            poll_interval,
            halt,
        }
    }

    /// 运行收集循环
    ///
    /// 收到停止信号后处理完通道中已有的结果再退出
    pub async fn run(mut self) {
        info!("Result collector started");

        loop {
            tokio::select! {
                biased;
                received = tokio::time::timeout(self.poll_interval, self.results.recv()) => {
                    match received {
                        Ok(Some(outcome)) => self.handle(outcome).await,
                        Ok(None) => break,
                        Err(_) => continue,
                    }
                }
                _ = halted(&mut self.halt) => {
                    while let Ok(outcome) = self.results.try_recv() {
                        self.handle(outcome).await;
                    }
                    break;
                }
            }
        }

        info!("Result collector stopped");
    }

    /// 处理单个结果
    pub async fn handle(&self, outcome: JobOutcome) {
        let JobOutcome {
            job,
            result,
            processing_time,
            worker_id,
            ..
        } = outcome;

        match result {
            Ok(record) => {
                if let Err(e) = self.persist(&job, &record).await {
                    counter!("scrape_persistence_failures_total").increment(1);
                    error!(
                        job_id = %job.id,
                        site = %job.site,
                        url = %job.url,
                        error = %e,
                        "Failed to persist product data"
                    );
                }
                self.stats
                    .record_success(&self.config.canonical_site(&job.site), processing_time);
                counter!("scrape_jobs_completed_total").increment(1);
                histogram!("scrape_job_duration_seconds").record(processing_time.as_secs_f64());
                debug!(
                    job_id = %job.id,
                    worker_id = %worker_id,
                    elapsed_ms = processing_time.as_millis() as u64,
                    "Job completed"
                );
            }
            Err(failure) => self.handle_failure(job, failure).await,
        }

        gauge!("scrape_jobs_active").set(self.stats.active() as f64);
    }

    async fn handle_failure(&self, job: Job, failure: JobFailure) {
        if self.retry_policy.should_retry(job.retry_count) {
            let retry = job.into_retry(&self.retry_policy, Utc::now());
            warn!(
                job_id = %retry.id,
                site = %retry.site,
                url = %retry.url,
                attempt = retry.retry_count,
                max_retries = self.retry_policy.max_retries,
                priority = retry.priority,
                error = %failure,
                "Job failed, scheduling retry"
            );
            match self.queue.enqueue(retry) {
                Ok(()) => counter!("scrape_jobs_retried_total").increment(1),
                Err(_) => warn!("Queue closed, retry abandoned"),
            }
            return;
        }

        self.stats.record_terminal_failure();
        counter!("scrape_jobs_failed_total").increment(1);
        error!(
            job_id = %job.id,
            site = %job.site,
            url = %job.url,
            retries = job.retry_count,
            error = %failure,
            "Job failed permanently"
        );

        if let Some(journal) = &self.journal {
            if let Err(e) = journal
                .repository
                .record_error(
                    journal.session_id,
                    failure.kind.as_str(),
                    &failure.message,
                    Some(&job.url),
                )
                .await
            {
                error!(error = %e, "Failed to record scraping error");
            }
        }
    }

    /// 持久化商品数据：站点 -> 商品 -> 商品URL -> 价格记录
    async fn persist(&self, job: &Job, record: &ProductRecord) -> Result<(), RepositoryError> {
        let site = self.config.canonical_site(&job.site);
        let rate_limit = self.config.rate_limit(&site).as_secs_f64();
        let site_id = self
            .store
            .upsert_site(
                &site,
                &self.config.site_base_url(&site),
                &self.config.site_kind(&site),
                rate_limit,
            )
            .await?;

        let product_id = self
            .store
            .upsert_product(
                &record.title,
                record.category(),
                record.brand.as_deref(),
                record.model.as_deref(),
            )
            .await?;

        let url_id = self
            .store
            .upsert_product_url(product_id, site_id, &job.url)
            .await?;

        if let Some(point) = record.price_point() {
            self.store.insert_price_point(url_id, &point).await?;
        }

        Ok(())
    }
}
