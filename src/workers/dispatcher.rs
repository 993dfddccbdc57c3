// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tracing::{debug, info};

use crate::domain::models::job::Job;
use crate::queue::job_queue::JobQueue;
use crate::queue::rate_limiter::SiteRateLimiter;
use crate::workers::halted;
use crate::workers::pool::WorkerPool;

/// 调度器
///
/// 单一控制循环：获取工作池槽位，从队列取出任务，经过限流检查后交给工作池执行
pub struct Dispatcher {
    queue: Arc<JobQueue>,
    limiter: SiteRateLimiter,
    pool: Arc<WorkerPool>,
    dequeue_timeout: Duration,
    rate_limit_backoff: Duration,
    halt: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<JobQueue>,
        limiter: SiteRateLimiter,
        pool: Arc<WorkerPool>,
        dequeue_timeout: Duration,
        rate_limit_backoff: Duration,
        halt: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            limiter,
            pool,
            dequeue_timeout,
            rate_limit_backoff,
            halt,
        }
    }

    /// 运行调度循环，直到收到停止信号
    pub async fn run(mut self) {
        info!("Dispatcher started");

        loop {
            if *self.halt.borrow() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = halted(&mut self.halt) => break,
                permit = self.pool.acquire_slot() => match permit {
                    Some(permit) => permit,
                    None => break,
                },
            };

            let job = tokio::select! {
                biased;
                _ = halted(&mut self.halt) => break,
                job = self.queue.dequeue(self.dequeue_timeout) => job,
            };

            let Some(job) = job else {
                continue;
            };

            if !self.dispatch_from(job, permit) {
                tokio::select! {
                    biased;
                    _ = halted(&mut self.halt) => break,
                    _ = tokio::time::sleep(self.rate_limit_backoff) => {}
                }
            }
        }

        info!("Dispatcher stopped");
    }

    /// 从给定任务开始扫描队列，派发第一个可以执行的任务
    ///
    /// 未到调度时间或站点被限流的任务会以原优先级重新入队，
    /// 被限流的站点在本轮扫描中不再检查，其他站点的任务仍可派发。
    /// 返回是否派发了任务
    fn dispatch_from(&self, first: Job, permit: OwnedSemaphorePermit) -> bool {
        let now = Utc::now();
        let mut deferred = Vec::new();
        let mut blocked_sites = HashSet::new();
        let mut chosen = None;
        let mut candidate = Some(first);

        while let Some(job) = candidate.take() {
            let site = self.limiter.site_key(&job.site);
            if !job.is_due(now) || blocked_sites.contains(&site) {
                deferred.push(job);
            } else if self.limiter.try_acquire(&job.site) {
                chosen = Some(job);
                break;
            } else {
                debug!(
                    job_id = %job.id,
                    site = %job.site,
                    wait_ms = self.limiter.time_until_ready(&job.site).as_millis() as u64,
                    "Site rate limited, deferring job"
                );
                counter!("scrape_jobs_rate_limited_total").increment(1);
                blocked_sites.insert(site);
                deferred.push(job);
            }
            candidate = self.queue.try_dequeue();
        }

        for job in deferred {
            if self.queue.enqueue(job).is_err() {
                debug!("Queue closed, deferred job left for abandonment");
            }
        }

        match chosen {
            Some(job) => {
                debug!(job_id = %job.id, site = %job.site, "Dispatching job");
                self.pool.submit(job, permit);
                true
            }
            None => false,
        }
    }
}
