// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 缓存（cache）：限流快照跟踪器的进程内与 Redis 实现
/// - 数据库（database）：数据库连接和实体映射
/// - 指标（metrics）：Prometheus 导出器
/// - 远程调用（remote）：基于 reqwest 的远程 API 客户端
/// - 仓库实现（repositories）：领域仓库接口的具体实现
pub mod cache;
pub mod database;
pub mod metrics;
pub mod remote;
pub mod repositories;
