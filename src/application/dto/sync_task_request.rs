// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::sync_task::{EntityType, NewSyncTask, SyncOperation};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// 入队请求DTO
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct EnqueueTaskRequestDto {
    /// 执行任务的子账号ID
    #[validate(range(min = 1))]
    pub account_id: i64,

    /// 实体类型，例如 `product`、`product_batch`
    #[validate(length(min = 1, message = "entity_type cannot be empty"))]
    pub entity_type: String,

    /// 主账号侧的实体ID
    #[validate(length(min = 1, max = 255, message = "entity_id cannot be empty"))]
    pub entity_id: String,

    pub operation: SyncOperation,

    /// 优先级，数值越大越先执行
    #[validate(range(min = -100, max = 100))]
    pub priority: Option<i32>,

    /// 任务负载，必须带有 `main_account_id`
    pub payload: Value,

    /// 计划执行时间，缺省为立即
    pub scheduled_at: Option<DateTime<FixedOffset>>,

    #[validate(range(min = 1, max = 20))]
    pub max_attempts: Option<i32>,
}

impl EnqueueTaskRequestDto {
    /// 转换为领域层入队请求
    pub fn into_new_task(self, default_max_attempts: i32) -> NewSyncTask {
        let mut task = NewSyncTask::new(
            self.account_id,
            EntityType::from(self.entity_type),
            self.entity_id,
            self.operation,
            self.payload,
        )
        .with_priority(self.priority.unwrap_or(0))
        .with_max_attempts(self.max_attempts.unwrap_or(default_max_attempts));

        if let Some(at) = self.scheduled_at {
            task = task.scheduled_at(at);
        }
        task
    }
}
