// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 同步任务管理与 Webhook 健康报告两组管理接口
pub mod task_handler;
pub mod webhook_health_handler;
