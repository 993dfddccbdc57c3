// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置、环境变量以及按站点的抓取参数
pub mod config;

/// 领域模块
///
/// 包含任务、商品记录、统计等核心实体，以及仓库接口和数据校验服务
pub mod domain;

/// 引擎模块
///
/// 站点适配器、页面获取和适配器注册表
pub mod engines;

/// 基础设施模块
///
/// 数据库连接、实体映射、指标导出和仓库实现
pub mod infrastructure;

/// 队列模块
///
/// 优先级任务队列和按站点的限流器
pub mod queue;

/// 工具模块
///
/// 错误类型、重试策略和遥测初始化
pub mod utils;

/// 工作器模块
///
/// 调度器、工作池、结果收集器以及对外的抓取管理器
pub mod workers;
