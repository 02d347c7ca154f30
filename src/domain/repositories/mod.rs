// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 领域层定义持久化契约，具体实现由基础设施层提供：
/// - 同步任务仓库（sync_task_repository）：队列存储与状态机
/// - 实体映射仓库（entity_mapping_repository）：主子账号实体ID对应关系
/// - 账号仓库（account_repository）：账号与子账号设置
/// - Webhook 健康仓库（webhook_health_repository）：订阅健康记录
pub mod account_repository;
pub mod entity_mapping_repository;
pub mod sync_task_repository;
pub mod webhook_health_repository;
