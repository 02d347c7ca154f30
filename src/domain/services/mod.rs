// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 远程 API（remote_api）：远程调用协作方接口与错误类型
/// - 限流跟踪（rate_limit_tracker）：按账号缓存限流快照的接口
/// - 同步统计（sync_stats）：任务结果统计接口
/// - 批量失败分解（batch_decomposer）：批量任务整体失败后拆分为单实体任务
/// - Webhook 健康（webhook_health_service）：订阅健康检查与自动修复
/// - 健康告警（health_notifier）：严重健康状态的通知
pub mod batch_decomposer;
pub mod health_notifier;
pub mod rate_limit_tracker;
pub mod remote_api;
pub mod sync_stats;
pub mod webhook_health_service;
