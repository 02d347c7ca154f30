// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::webhook_health_service::WebhookHealthMonitor;
use crate::presentation::handlers::{task_handler, webhook_health_handler};
use crate::queue::task_queue::SyncQueue;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 管理接口共享状态
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn SyncQueue>,
    pub monitor: Arc<WebhookHealthMonitor>,
    /// 请求未指定时的最大尝试次数
    pub default_max_attempts: i32,
    /// 手动触发检查时是否自动修复
    pub auto_heal: bool,
}

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let admin_routes = Router::new()
        .route("/v1/tasks", post(task_handler::enqueue_task))
        .route("/v1/tasks/{id}", get(task_handler::get_task))
        .route("/v1/tasks/{id}/retry", post(task_handler::retry_task))
        .route("/v1/webhooks/health", get(webhook_health_handler::list_health))
        .route(
            "/v1/webhooks/health/{account_id}",
            get(webhook_health_handler::get_health),
        )
        .route("/v1/webhooks/heal", post(webhook_health_handler::heal));

    Router::new().merge(public_routes).merge(admin_routes)
}

/// 带状态和请求追踪的完整应用
pub fn app(state: AppState) -> Router {
    routes()
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
