// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tokio::sync::watch;

/// 工作器模块
///
/// 包括工作池、调度器、结果收集器和抓取管理器
pub mod collector;
pub mod dispatcher;
pub mod manager;
pub mod pool;

pub use manager::{ManagerOptions, ScrapingManager};

/// 等待停止信号，发送端被丢弃也视为停止
pub(crate) async fn halted(halt: &mut watch::Receiver<bool>) {
    let _ = halt.wait_for(|halted| *halted).await;
}
