// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::traits::{SyncContext, SyncError};
use crate::domain::models::sync_task::SyncTask;
use serde_json::{Map, Value};

/// 实体数据转换
///
/// 把主账号侧的实体数据转换为子账号侧的请求体。价格、属性、币种等
/// 字段级映射由具体实现负责。
pub trait EntityTransformer: Send + Sync {
    fn transform(&self, task: &SyncTask, ctx: &SyncContext<'_>) -> Result<Value, SyncError>;
}

/// 直接透传 payload 中的 `data`
#[derive(Debug, Default, Clone)]
pub struct PassthroughTransformer;

impl EntityTransformer for PassthroughTransformer {
    fn transform(&self, task: &SyncTask, _ctx: &SyncContext<'_>) -> Result<Value, SyncError> {
        match task.payload.get("data") {
            Some(data) if data.is_object() => Ok(data.clone()),
            _ => Err(SyncError::InvalidPayload(format!(
                "task {} has no 'data' object",
                task.id
            ))),
        }
    }
}

/// 只保留部分字段（webhook 部分更新）
pub fn retain_fields(data: &Value, fields: &[String]) -> Value {
    let Some(object) = data.as_object() else {
        return data.clone();
    };

    let filtered: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Value::Object(filtered)
}
