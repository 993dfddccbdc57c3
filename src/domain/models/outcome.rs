// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::job::Job;
use super::product::ProductRecord;

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 网络错误
    Network,
    /// 页面解析错误
    Parsing,
    /// 请求超时
    Timeout,
    /// 数据校验失败
    Validation,
    /// 站点没有对应的适配器
    UnsupportedSite,
    /// 执行过程中发生 panic
    Panic,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Parsing => "parsing",
            FailureKind::Timeout => "timeout",
            FailureKind::Validation => "validation",
            FailureKind::UnsupportedSite => "unsupported_site",
            FailureKind::Panic => "panic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已分类的任务失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JobFailure {}

/// 任务执行结果
///
/// 由工作者在任务完成时创建，并且只会被结果收集器消费一次
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// 执行的任务
    pub job: Job,
    /// 抽取出的商品记录或失败原因
    pub result: Result<ProductRecord, JobFailure>,
    /// 从取到任务到生成结果的耗时
    pub processing_time: Duration,
    /// 执行该任务的工作者
    pub worker_id: String,
    /// 完成时间
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn job_id(&self) -> uuid::Uuid {
        self.job.id
    }

    pub fn error(&self) -> Option<&JobFailure> {
        self.result.as_ref().err()
    }
}
