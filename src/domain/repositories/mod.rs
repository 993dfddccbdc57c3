// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 价格仓库（price_repository）：站点、商品、商品URL和价格历史
/// - 会话仓库（session_repository）：抓取会话与终态失败日志
pub mod price_repository;
pub mod session_repository;
