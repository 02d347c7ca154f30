// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::sync_task_request::EnqueueTaskRequestDto;
use crate::domain::models::sync_task::SyncTask;
use crate::presentation::errors::AppError;
use crate::presentation::routes::AppState;
use crate::queue::task_queue::QueueError;
use axum::{extract::Path, http::StatusCode, Extension, Json};
use tracing::info;
use validator::Validate;

/// 入队同步任务
///
/// # 参数
///
/// * `state` - 应用状态
/// * `payload` - 入队请求
///
/// # 返回值
///
/// * `201` - 新建的任务
/// * `400` - 请求校验失败或负载缺少 `main_account_id`
pub async fn enqueue_task(
    Extension(state): Extension<AppState>,
    Json(payload): Json<EnqueueTaskRequestDto>,
) -> Result<(StatusCode, Json<SyncTask>), AppError> {
    payload.validate()?;

    let task = state
        .queue
        .enqueue(payload.into_new_task(state.default_max_attempts))
        .await?;
    info!(
        "Enqueued task {} ({} {} for account {})",
        task.id, task.operation, task.entity_type, task.account_id
    );

    Ok((StatusCode::CREATED, Json(task)))
}

/// 查询任务
pub async fn get_task(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SyncTask>, AppError> {
    let task = state.queue.find(id).await?.ok_or(QueueError::NotFound(id))?;
    Ok(Json(task))
}

/// 手动重试失败任务
///
/// 任务不存在返回 404，不处于 failed 状态返回 409
pub async fn retry_task(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SyncTask>, AppError> {
    let task = state.queue.retry(id).await?;
    info!("Task {} reset to pending by operator", id);
    Ok(Json(task))
}
