// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::statistics::ManagerState;
use thiserror::Error;

/// 抓取管理器错误类型
///
/// 只有调用契约违规和执行器不可用会以错误形式离开管理器，
/// 单个任务的失败全部通过统计信息体现
#[derive(Error, Debug)]
pub enum ManagerError {
    /// 在不允许的状态下调用了生命周期操作
    #[error("Cannot {operation} while manager is {state}")]
    InvalidState {
        operation: &'static str,
        state: ManagerState,
    },

    /// 工作池或运行时创建失败
    #[error("Executor unavailable: {0}")]
    ExecutorUnavailable(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
}
