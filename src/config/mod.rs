// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置提供者接口
pub mod provider;

/// 配置模块
///
/// 处理应用程序的配置设置，包括抓取、重试、数据库、站点等配置
pub mod settings;
