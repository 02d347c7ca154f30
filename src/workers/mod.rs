// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 同步调度工作器、Webhook 健康检查工作器，以及按固定周期驱动它们的管理器
pub mod manager;
pub mod sync_worker;
pub mod webhook_health_worker;
pub mod worker;

pub use worker::Worker;
