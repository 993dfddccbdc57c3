// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 抓取管理器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// 已创建，尚未启动
    Idle,
    /// 调度器、收集器和工作池正在运行
    Running,
    /// 已请求停止，正在等待执行中的任务
    Draining,
    /// 已停止，资源已释放
    Stopped,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ManagerState::Idle => write!(f, "idle"),
            ManagerState::Running => write!(f, "running"),
            ManagerState::Draining => write!(f, "draining"),
            ManagerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// 运行统计快照
///
/// `jobs_active + jobs_completed + jobs_failed + jobs_abandoned == jobs_queued`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub session_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub jobs_queued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_abandoned: u64,
    /// 尚未到达终态的任务数（排队、延迟、执行中或等待收集）
    pub jobs_active: u64,
    /// 正在工作池中执行的任务数
    pub jobs_in_flight: u64,
    pub queue_size: u64,
    pub total_processing_seconds: f64,
    pub avg_processing_seconds: f64,
    pub sites_processed: Vec<String>,
    pub elapsed_seconds: f64,
    /// 每秒完成任务数
    pub throughput: f64,
    pub state: ManagerState,
}

#[derive(Debug, Default)]
struct Counters {
    started: Option<(DateTime<Utc>, Instant)>,
    queued: u64,
    completed: u64,
    failed: u64,
    abandoned: u64,
    processing_time: Duration,
    sites: HashSet<String>,
}

impl Counters {
    fn active(&self) -> u64 {
        self.queued
            .saturating_sub(self.completed + self.failed + self.abandoned)
    }
}

/// 运行统计
///
/// 所有计数在同一把锁下更新，快照因此总是一致的时间点副本
#[derive(Debug, Default)]
pub struct RunStatistics {
    inner: Mutex<Counters>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录开始时间，只在第一次调用时生效
    pub fn mark_started(&self) {
        let mut inner = self.inner.lock();
        if inner.started.is_none() {
            inner.started = Some((Utc::now(), Instant::now()));
        }
    }

    pub fn record_queued(&self, count: u64) {
        self.inner.lock().queued += count;
    }

    pub fn record_success(&self, site: &str, processing_time: Duration) {
        let mut inner = self.inner.lock();
        inner.completed += 1;
        inner.processing_time += processing_time;
        if !inner.sites.contains(site) {
            inner.sites.insert(site.to_string());
        }
    }

    pub fn record_terminal_failure(&self) {
        self.inner.lock().failed += 1;
    }

    /// 把所有未到终态的任务记为放弃，返回放弃数量
    pub fn abandon_outstanding(&self) -> u64 {
        let mut inner = self.inner.lock();
        let outstanding = inner.active();
        inner.abandoned += outstanding;
        outstanding
    }

    /// 尚未到达终态的任务数
    pub fn active(&self) -> u64 {
        self.inner.lock().active()
    }

    pub fn completed(&self) -> u64 {
        self.inner.lock().completed
    }

    pub fn failed(&self) -> u64 {
        self.inner.lock().failed
    }

    pub fn snapshot(
        &self,
        session_id: Uuid,
        queue_size: usize,
        in_flight: usize,
        state: ManagerState,
    ) -> StatisticsSnapshot {
        let inner = self.inner.lock();

        let elapsed = inner
            .started
            .map(|(_, at)| at.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let total = inner.processing_time.as_secs_f64();
        let avg = if inner.completed > 0 {
            total / inner.completed as f64
        } else {
            0.0
        };
        let throughput = if elapsed > 0.0 {
            inner.completed as f64 / elapsed
        } else {
            0.0
        };

        let mut sites: Vec<String> = inner.sites.iter().cloned().collect();
        sites.sort();

        StatisticsSnapshot {
            session_id,
            started_at: inner.started.map(|(at, _)| at),
            jobs_queued: inner.queued,
            jobs_completed: inner.completed,
            jobs_failed: inner.failed,
            jobs_abandoned: inner.abandoned,
            jobs_active: inner.active(),
            jobs_in_flight: in_flight as u64,
            queue_size: queue_size as u64,
            total_processing_seconds: total,
            avg_processing_seconds: avg,
            sites_processed: sites,
            elapsed_seconds: elapsed,
            throughput,
            state,
        }
    }
}
