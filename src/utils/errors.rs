// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::queue::task_queue::QueueError;
use std::time::Duration;
use thiserror::Error;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(String),

    #[error("队列错误: {0}")]
    QueueError(String),

    #[error("批次处理超时: {0:?}")]
    Timeout(Duration),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<RepositoryError> for WorkerError {
    fn from(err: RepositoryError) -> Self {
        WorkerError::RepositoryError(err.to_string())
    }
}

impl From<QueueError> for WorkerError {
    fn from(err: QueueError) -> Self {
        WorkerError::QueueError(err.to_string())
    }
}
