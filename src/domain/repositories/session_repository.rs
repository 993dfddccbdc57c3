// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::price_repository::RepositoryError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// 抓取会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 抓取会话仓库特质
///
/// 记录每次运行的起止和终态失败
#[async_trait]
pub trait ScrapingSessionRepository: Send + Sync {
    /// 开始一次会话
    async fn open_session(&self, session_id: Uuid, metadata: Value)
        -> Result<(), RepositoryError>;

    /// 结束会话
    async fn close_session(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        products_scraped: u64,
        errors_count: u64,
    ) -> Result<(), RepositoryError>;

    /// 记录一次终态失败
    async fn record_error(
        &self,
        session_id: Uuid,
        error_type: &str,
        message: &str,
        url: Option<&str>,
    ) -> Result<(), RepositoryError>;
}
