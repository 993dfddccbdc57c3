// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// 重试策略配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大重试次数
    pub max_retries: u32,
    /// 重试任务相对原始优先级的偏移量（数值越大越晚调度）
    pub retry_priority_offset: i32,
    /// 退避时间表，第 n 次重试使用第 n 项，超出部分沿用最后一项
    pub backoff_schedule: Vec<Duration>,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_priority_offset: 10,
            backoff_schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// 创建标准重试策略
    pub fn standard() -> Self {
        Self::default()
    }

    /// 创建立即重试策略（无退避，失败后立刻重新入队）
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_schedule: Vec::new(),
            ..Self::default()
        }
    }

    /// 是否应该重试
    ///
    /// `retry_count` 为任务已经重试过的次数
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    /// 计算重试任务的优先级
    pub fn retry_priority(&self, base_priority: i32) -> i32 {
        base_priority.saturating_add(self.retry_priority_offset)
    }

    /// 计算第 `attempt` 次重试（从 1 开始）的退避时间
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let Some(last) = self.backoff_schedule.len().checked_sub(1) else {
            return Duration::ZERO;
        };

        let index = (attempt.max(1) as usize - 1).min(last);
        let backoff = self.backoff_schedule[index].as_secs_f64();

        let jitter_range = backoff * self.jitter_factor.clamp(0.0, 1.0);
        let final_backoff = if jitter_range > 0.0 {
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (backoff + jitter).max(0.0)
        } else {
            backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 计算下次重试的最早调度时间
    pub fn next_retry_time(&self, attempt: u32, base_time: DateTime<Utc>) -> DateTime<Utc> {
        let backoff = self.calculate_backoff(attempt);
        base_time + chrono::Duration::milliseconds(backoff.as_millis() as i64)
    }
}
