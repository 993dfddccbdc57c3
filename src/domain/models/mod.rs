// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 抓取任务（job）：一次 (站点, URL) 抓取请求
/// - 执行结果（outcome）：工作者产生的一次性结果
/// - 商品记录（product）：站点适配器抽取出的结构化数据
/// - 运行统计（statistics）：管理器状态与计数快照
pub mod job;
pub mod outcome;
pub mod product;
pub mod statistics;
