// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::domain::services::webhook_health_service::HealthError;
use crate::queue::task_queue::QueueError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<validator::ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }

        if let Some(err) = self.0.downcast_ref::<QueueError>() {
            return match err {
                QueueError::NotFound(_) | QueueError::Repository(RepositoryError::NotFound) => {
                    StatusCode::NOT_FOUND
                }
                QueueError::InvalidState { .. } => StatusCode::CONFLICT,
                QueueError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                QueueError::Repository(RepositoryError::Database(_) | RepositoryError::Corrupted(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
        }

        if let Some(err) = self.0.downcast_ref::<HealthError>() {
            return match err {
                HealthError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                HealthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }

        match self.0.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
