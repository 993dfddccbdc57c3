// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::retry_policy::RetryPolicy;

/// 新任务的默认优先级
pub const DEFAULT_PRIORITY: i32 = 1;

/// 抓取任务实体
///
/// 表示一次 (站点, URL) 抓取请求。优先级数值越小越先调度，
/// 除重试计数、当前优先级和计划时间外，其余字段在任务生命周期内不变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 站点标识
    pub site: String,
    /// 目标URL
    pub url: String,
    /// 当前调度优先级
    pub priority: i32,
    /// 入队时的原始优先级，重试优先级以此为基准计算
    pub base_priority: i32,
    /// 已重试次数
    pub retry_count: u32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最早调度时间，为空表示立即可调度
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Job {
    /// 创建新的抓取任务
    pub fn new(site: impl Into<String>, url: impl Into<String>, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            site: site.into(),
            url: url.into(),
            priority,
            base_priority: priority,
            retry_count: 0,
            created_at: Utc::now(),
            scheduled_at: None,
        }
    }

    /// 任务在 `now` 时刻是否已到调度时间
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.scheduled_at {
            Some(at) => at <= now,
            None => true,
        }
    }

    /// 生成重试任务
    ///
    /// 重试计数加一，优先级调整为原始优先级加偏移，并按退避时间表推迟调度
    pub fn into_retry(mut self, policy: &RetryPolicy, now: DateTime<Utc>) -> Self {
        self.retry_count += 1;
        self.priority = policy.retry_priority(self.base_priority);
        let next = policy.next_retry_time(self.retry_count, now);
        self.scheduled_at = (next > now).then_some(next);
        self
    }
}

/// 任务提交请求
///
/// 批量任务文件中的单条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub site: String,
    pub url: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl JobRequest {
    pub fn new(site: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            url: url.into(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn into_job(self) -> Job {
        Job::new(self.site, self.url, self.priority)
    }
}
