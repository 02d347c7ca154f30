// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::webhook_health_service::WebhookHealthMonitor;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Webhook 健康检查工作器
///
/// 与同步调度独立，按较粗的周期（默认每小时）巡检所有启用账号
pub struct WebhookHealthWorker {
    monitor: Arc<WebhookHealthMonitor>,
    interval: Duration,
    auto_heal: bool,
}

impl WebhookHealthWorker {
    pub fn new(monitor: Arc<WebhookHealthMonitor>, interval: Duration, auto_heal: bool) -> Self {
        Self {
            monitor,
            interval,
            auto_heal,
        }
    }
}

#[async_trait]
impl Worker for WebhookHealthWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        self.monitor
            .run(self.auto_heal)
            .await
            .map(|_| ())
            .map_err(|e| WorkerError::InternalError(e.to_string()))
    }

    fn name(&self) -> &str {
        "webhook_health"
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}
