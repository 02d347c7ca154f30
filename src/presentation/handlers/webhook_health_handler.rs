// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook_health::AccountHealthReport;
use crate::domain::services::webhook_health_service::HealthRunSummary;
use crate::presentation::errors::AppError;
use crate::presentation::routes::AppState;
use axum::{extract::Path, Extension, Json};

/// 所有启用账号的健康报告（只读，不访问远端）
pub async fn list_health(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<AccountHealthReport>>, AppError> {
    Ok(Json(state.monitor.report_all().await?))
}

/// 单个账号的健康报告
pub async fn get_health(
    Extension(state): Extension<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountHealthReport>, AppError> {
    Ok(Json(state.monitor.report(account_id).await?))
}

/// 立即执行一轮检查，并按配置自动修复
pub async fn heal(Extension(state): Extension<AppState>) -> Result<Json<HealthRunSummary>, AppError> {
    Ok(Json(state.monitor.run(state.auto_heal).await?))
}
