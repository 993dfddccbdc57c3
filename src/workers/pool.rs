// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::domain::models::job::Job;
use crate::domain::models::outcome::{FailureKind, JobFailure, JobOutcome};
use crate::domain::models::product::ProductRecord;
use crate::domain::services::validator::ProductValidator;
use crate::engines::registry::AdapterRegistry;
use crate::utils::errors::ManagerError;

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// 在当前 tokio 运行时上执行
    #[default]
    Shared,
    /// 使用独立的多线程运行时执行
    Dedicated,
}

/// 任务执行上下文
///
/// 所有工作者共享，只包含线程安全的协作者
pub struct ExecutionContext {
    pub registry: Arc<AdapterRegistry>,
    pub validator: Arc<dyn ProductValidator>,
}

/// 工作池
///
/// 固定数量的执行槽位，调度器先获取槽位再出队，形成背压。
/// 每个任务执行完成后把结果发送到结果通道，然后释放槽位
pub struct WorkerPool {
    mode: ExecutionMode,
    size: usize,
    slots: Arc<Semaphore>,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    context: Arc<ExecutionContext>,
    results: mpsc::UnboundedSender<JobOutcome>,
    in_flight: Arc<AtomicUsize>,
    submitted: AtomicU64,
}

impl WorkerPool {
    /// 创建工作池
    ///
    /// # 参数
    ///
    /// * `mode` - 执行模式
    /// * `size` - 并发槽位数量
    /// * `context` - 执行上下文
    /// * `results` - 结果通道发送端
    ///
    /// # 返回值
    ///
    /// * `Ok(WorkerPool)` - 创建成功
    /// * `Err(ManagerError::ExecutorUnavailable)` - 没有可用的运行时或运行时创建失败
    pub fn new(
        mode: ExecutionMode,
        size: usize,
        context: Arc<ExecutionContext>,
        results: mpsc::UnboundedSender<JobOutcome>,
    ) -> Result<Self, ManagerError> {
        let size = size.max(1);
        let (handle, runtime) = match mode {
            ExecutionMode::Shared => {
                let handle = Handle::try_current().map_err(|e| {
                    ManagerError::ExecutorUnavailable(format!("no tokio runtime available: {}", e))
                })?;
                (handle, None)
            }
            ExecutionMode::Dedicated => {
                let runtime = Builder::new_multi_thread()
                    .worker_threads(size)
                    .thread_name("pricewatch-worker")
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        ManagerError::ExecutorUnavailable(format!(
                            "failed to build worker runtime: {}",
                            e
                        ))
                    })?;
                (runtime.handle().clone(), Some(runtime))
            }
        };

        debug!("Worker pool created: mode={:?}, size={}", mode, size);

        Ok(Self {
            mode,
            size,
            slots: Arc::new(Semaphore::new(size)),
            handle,
            runtime: Mutex::new(runtime),
            context,
            results,
            in_flight: Arc::new(AtomicUsize::new(0)),
            submitted: AtomicU64::new(0),
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 正在执行的任务数
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 等待一个空闲槽位，工作池关闭后返回 `None`
    pub async fn acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        self.slots.clone().acquire_owned().await.ok()
    }

    /// 提交任务异步执行，不等待其完成
    pub fn submit(&self, job: Job, permit: OwnedSemaphorePermit) {
        let seq = self.submitted.fetch_add(1, Ordering::Relaxed);
        let context = self.context.clone();
        let results = self.results.clone();
        let in_flight = self.in_flight.clone();

        in_flight.fetch_add(1, Ordering::SeqCst);
        self.handle.spawn(async move {
            let thread = std::thread::current();
            let worker_id = format!("{}#{}", thread.name().unwrap_or("worker"), seq);

            let outcome = execute(&context, job, worker_id).await;

            in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = results.send(outcome) {
                warn!(job_id = %e.0.job.id, "Result channel closed, outcome dropped");
            }
            drop(permit);
        });
    }

    /// 等待所有槽位空闲，最多等待 `timeout`
    ///
    /// 返回 `true` 表示所有执行中的任务都已完成
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.slots.acquire_many(self.size as u32)).await {
            Ok(Ok(_permits)) => true,
            Ok(Err(_)) => self.in_flight() == 0,
            Err(_) => false,
        }
    }

    /// 关闭工作池
    ///
    /// 不再发放槽位；独立运行时会在后台关闭，未完成的任务被放弃
    pub fn shutdown(&self) {
        self.slots.close();
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // 在异步上下文中直接 drop Runtime 会 panic
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// 执行单个任务的完整流水线
///
/// 适配器和校验器的错误以及 panic 都会被转换为失败结果，不会向外传播
#[instrument(
    name = "execute_job",
    skip(context, job),
    fields(job_id = %job.id, site = %job.site, url = %job.url, retry = job.retry_count)
)]
pub async fn execute(context: &ExecutionContext, job: Job, worker_id: String) -> JobOutcome {
    let start = Instant::now();

    let result = AssertUnwindSafe(run_pipeline(context, &job))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(JobFailure::new(
                FailureKind::Panic,
                panic_message(panic.as_ref()),
            ))
        });

    let processing_time = start.elapsed();
    match &result {
        Ok(_) => debug!(elapsed_ms = processing_time.as_millis() as u64, "Job succeeded"),
        Err(failure) => debug!(error = %failure, "Job failed"),
    }

    JobOutcome {
        job,
        result,
        processing_time,
        worker_id,
        finished_at: Utc::now(),
    }
}

async fn run_pipeline(context: &ExecutionContext, job: &Job) -> Result<ProductRecord, JobFailure> {
    let adapter = context.registry.get(&job.site)?;
    let record = adapter.fetch_and_extract(&job.url).await?;
    let record = context.validator.validate(record)?;
    Ok(record)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("worker panicked: {}", s)
    } else {
        "worker panicked".to_string()
    }
}
