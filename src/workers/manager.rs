// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::provider::ScrapingConfigProvider;
use crate::config::settings::Settings;
use crate::domain::models::job::{Job, JobRequest};
use crate::domain::models::statistics::{ManagerState, RunStatistics, StatisticsSnapshot};
use crate::domain::repositories::price_repository::PriceRepository;
use crate::domain::repositories::session_repository::{ScrapingSessionRepository, SessionStatus};
use crate::domain::services::validator::ProductValidator;
use crate::engines::registry::AdapterRegistry;
use crate::queue::job_queue::JobQueue;
use crate::queue::rate_limiter::SiteRateLimiter;
use crate::utils::errors::ManagerError;
use crate::workers::collector::{ResultCollector, SessionJournal};
use crate::workers::dispatcher::Dispatcher;
use crate::workers::pool::{ExecutionContext, ExecutionMode, WorkerPool};

/// 管理器运行参数
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// 执行模式
    pub execution_mode: ExecutionMode,
    /// 调度器出队等待时间
    pub dequeue_timeout: Duration,
    /// 限流时调度器的让步时间
    pub rate_limit_backoff: Duration,
    /// 结果收集与等待完成的轮询间隔
    pub completion_poll_interval: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Shared,
            dequeue_timeout: Duration::from_secs(1),
            rate_limit_backoff: Duration::from_millis(100),
            completion_poll_interval: Duration::from_millis(100),
        }
    }
}

impl ManagerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            execution_mode: settings.scraping.execution_mode,
            dequeue_timeout: settings.dequeue_timeout(),
            rate_limit_backoff: settings.rate_limit_backoff(),
            completion_poll_interval: settings.completion_poll_interval(),
        }
    }
}

struct RunningParts {
    pool: Arc<WorkerPool>,
    dispatcher: JoinHandle<()>,
    collector: JoinHandle<()>,
    dispatcher_halt: watch::Sender<bool>,
    collector_halt: watch::Sender<bool>,
}

/// 抓取管理器
///
/// 持有任务队列、限流器、工作池、调度器和结果收集器，
/// 对外提供入队、启动、等待完成、停止和统计快照等操作。
///
/// 状态流转：`Idle -> Running -> Draining -> Stopped`
pub struct ScrapingManager {
    config: Arc<dyn ScrapingConfigProvider>,
    registry: Arc<AdapterRegistry>,
    validator: Arc<dyn ProductValidator>,
    store: Arc<dyn PriceRepository>,
    sessions: Option<Arc<dyn ScrapingSessionRepository>>,
    options: ManagerOptions,
    session_id: Uuid,
    queue: Arc<JobQueue>,
    limiter: SiteRateLimiter,
    stats: Arc<RunStatistics>,
    state: Mutex<ManagerState>,
    lifecycle: tokio::sync::Mutex<()>,
    running: Mutex<Option<RunningParts>>,
}

impl ScrapingManager {
    /// 创建新的抓取管理器
    ///
    /// # 参数
    ///
    /// * `config` - 站点限流、重试策略与工作者数量
    /// * `registry` - 站点适配器注册表
    /// * `validator` - 商品数据校验器
    /// * `store` - 持久化存储
    pub fn new(
        config: Arc<dyn ScrapingConfigProvider>,
        registry: Arc<AdapterRegistry>,
        validator: Arc<dyn ProductValidator>,
        store: Arc<dyn PriceRepository>,
    ) -> Self {
        let limiter = SiteRateLimiter::new(config.clone());
        Self {
            config,
            registry,
            validator,
            store,
            sessions: None,
            options: ManagerOptions::default(),
            session_id: Uuid::new_v4(),
            queue: Arc::new(JobQueue::new()),
            limiter,
            stats: Arc::new(RunStatistics::new()),
            state: Mutex::new(ManagerState::Idle),
            lifecycle: tokio::sync::Mutex::new(()),
            running: Mutex::new(None),
        }
    }

    pub fn with_options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// 启用会话日志
    pub fn with_session_repository(
        mut self,
        repository: Arc<dyn ScrapingSessionRepository>,
    ) -> Self {
        self.sessions = Some(repository);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> ManagerState {
        *self.state.lock()
    }

    fn set_state(&self, state: ManagerState) {
        *self.state.lock() = state;
    }

    /// 添加单个任务，返回任务ID
    pub fn add_job(
        &self,
        site: impl Into<String>,
        url: impl Into<String>,
        priority: i32,
    ) -> Result<Uuid, ManagerError> {
        let job = Job::new(site, url, priority);
        let id = job.id;
        self.enqueue_jobs("add job", vec![job])?;
        Ok(id)
    }

    /// 批量添加任务，等价于逐个调用 [`add_job`](Self::add_job)
    pub fn add_bulk_jobs(
        &self,
        requests: impl IntoIterator<Item = JobRequest>,
    ) -> Result<Vec<Uuid>, ManagerError> {
        let jobs: Vec<Job> = requests.into_iter().map(JobRequest::into_job).collect();
        let ids = jobs.iter().map(|j| j.id).collect();
        self.enqueue_jobs("add bulk jobs", jobs)?;
        Ok(ids)
    }

    fn enqueue_jobs(&self, operation: &'static str, jobs: Vec<Job>) -> Result<(), ManagerError> {
        // 持有状态锁直到入队完成，保证与 stop 的状态切换互斥
        let state = self.state.lock();
        if matches!(*state, ManagerState::Draining | ManagerState::Stopped) {
            error!("Cannot {} while manager is {}", operation, *state);
            return Err(ManagerError::InvalidState {
                operation,
                state: *state,
            });
        }

        let count = jobs.len() as u64;
        self.stats.record_queued(count);
        self.queue
            .enqueue_bulk(jobs)
            .map_err(|_| ManagerError::InvalidState {
                operation,
                state: *state,
            })?;
        counter!("scrape_jobs_queued_total").increment(count);
        gauge!("scrape_jobs_active").set(self.stats.active() as f64);
        Ok(())
    }

    /// 启动调度器、结果收集器和工作池
    ///
    /// 已在运行时只记录警告；停止后再次启动返回错误
    pub async fn start(&self) -> Result<(), ManagerError> {
        let _guard = self.lifecycle.lock().await;

        match self.state() {
            ManagerState::Idle => {}
            ManagerState::Running => {
                warn!("Scraping manager is already running");
                return Ok(());
            }
            state => {
                error!("Cannot start manager while it is {}", state);
                return Err(ManagerError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }

        let workers = self.config.worker_count().max(1);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let context = Arc::new(ExecutionContext {
            registry: self.registry.clone(),
            validator: self.validator.clone(),
        });

        let pool = match WorkerPool::new(self.options.execution_mode, workers, context, results_tx)
        {
            Ok(pool) => Arc::new(pool),
            Err(e) => {
                error!("Failed to create worker pool: {}", e);
                return Err(e);
            }
        };

        self.stats.mark_started();
        let journal = self.open_session(workers).await;

        let (dispatcher_halt, dispatcher_rx) = watch::channel(false);
        let (collector_halt, collector_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(
            self.queue.clone(),
            self.limiter.clone(),
            pool.clone(),
            self.options.dequeue_timeout,
            self.options.rate_limit_backoff,
            dispatcher_rx,
        );
        let collector = ResultCollector::new(
            results_rx,
            self.queue.clone(),
            self.stats.clone(),
            self.store.clone(),
            self.config.clone(),
            journal,
            self.options.completion_poll_interval,
            collector_rx,
        );

        let (mode, pool_size) = (pool.mode(), pool.size());
        let parts = RunningParts {
            pool,
            dispatcher: tokio::spawn(dispatcher.run()),
            collector: tokio::spawn(collector.run()),
            dispatcher_halt,
            collector_halt,
        };
        *self.running.lock() = Some(parts);
        self.set_state(ManagerState::Running);

        info!(
            session_id = %self.session_id,
            workers = pool_size,
            mode = ?mode,
            queued = self.queue.len(),
            "Scraping manager started"
        );
        Ok(())
    }

    async fn open_session(&self, workers: usize) -> Option<SessionJournal> {
        let repository = self.sessions.clone()?;
        let metadata = json!({
            "workers": workers,
            "execution_mode": self.options.execution_mode,
            "queued": self.queue.len(),
        });
        if let Err(e) = repository.open_session(self.session_id, metadata).await {
            error!("Failed to open scraping session {}: {}", self.session_id, e);
        }
        Some(SessionJournal {
            repository,
            session_id: self.session_id,
        })
    }

    /// 等待所有任务到达终态
    ///
    /// 返回 `true` 表示全部完成，`false` 表示超时
    pub async fn wait_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.stats.active() == 0 {
                return true;
            }
            let mut pause = self.options.completion_poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                pause = pause.min(deadline - now);
            }
            tokio::time::sleep(pause).await;
        }
    }

    /// 停止管理器
    ///
    /// 先停止调度，再最多等待 `timeout` 让执行中的任务完成，
    /// 然后处理剩余结果并释放资源。仍在队列中的任务记为放弃
    pub async fn stop(&self, timeout: Duration) -> Result<(), ManagerError> {
        let _guard = self.lifecycle.lock().await;

        match self.state() {
            ManagerState::Stopped => {
                warn!("Scraping manager is already stopped");
                return Ok(());
            }
            state => {
                info!("Stopping scraping manager (state: {})", state);
            }
        }
        self.set_state(ManagerState::Draining);

        let parts = self.running.lock().take();
        let was_running = parts.is_some();
        if let Some(parts) = parts {
            let _ = parts.dispatcher_halt.send(true);
            if let Err(e) = parts.dispatcher.await {
                error!("Dispatcher task failed: {}", e);
            }

            if !parts.pool.wait_idle(timeout).await {
                warn!(
                    in_flight = parts.pool.in_flight(),
                    "Timed out waiting for in-flight jobs"
                );
            }

            let _ = parts.collector_halt.send(true);
            if let Err(e) = parts.collector.await {
                error!("Result collector task failed: {}", e);
            }
            parts.pool.shutdown();
        }

        self.queue.close();
        let left_in_queue = self.queue.drain().len();
        let abandoned = self.stats.abandon_outstanding();
        gauge!("scrape_jobs_active").set(0.0);

        if let Some(repository) = self.sessions.as_ref().filter(|_| was_running) {
            let status = if abandoned > 0 {
                SessionStatus::Cancelled
            } else {
                SessionStatus::Completed
            };
            if let Err(e) = repository
                .close_session(
                    self.session_id,
                    status,
                    self.stats.completed(),
                    self.stats.failed(),
                )
                .await
            {
                error!("Failed to close scraping session {}: {}", self.session_id, e);
            }
        }

        self.set_state(ManagerState::Stopped);
        info!(
            session_id = %self.session_id,
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            abandoned,
            left_in_queue,
            "Scraping manager stopped"
        );
        Ok(())
    }

    /// 获取统计快照，任何状态下都可调用
    pub fn statistics(&self) -> StatisticsSnapshot {
        let in_flight = self
            .running
            .lock()
            .as_ref()
            .map(|parts| parts.pool.in_flight())
            .unwrap_or(0);
        self.stats
            .snapshot(self.session_id, self.queue.len(), in_flight, self.state())
    }
}

impl Drop for ScrapingManager {
    fn drop(&mut self) {
        if let Some(parts) = self.running.get_mut().take() {
            let _ = parts.dispatcher_halt.send(true);
            let _ = parts.collector_halt.send(true);
            parts.pool.shutdown();
        }
    }
}
