// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 同步任务、实体映射、账号、限流快照和 Webhook 健康记录
pub mod account;
pub mod entity_mapping;
pub mod rate_limit;
pub mod sync_task;
pub mod webhook_health;
