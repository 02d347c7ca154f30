// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册同步引擎的各类指标
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!("sync_tasks_claimed_total", "Tasks claimed from the queue");
    describe_counter!("sync_tasks_completed_total", "Tasks completed");
    describe_counter!("sync_tasks_failed_total", "Tasks failed, by reason");
    describe_counter!("sync_tasks_rescheduled_total", "Tasks put back into the queue, by reason");
    describe_histogram!("sync_task_duration_seconds", "Handler execution time in seconds");
    describe_counter!("sync_rate_limit_hits_total", "Rate limit signals, by scope");
    describe_counter!("sync_batches_decomposed_total", "Batch tasks decomposed into single tasks");
    describe_counter!(
        "sync_remote_preemptive_throttle_total",
        "Remote calls skipped because the tracked quota was exhausted"
    );
    describe_counter!("webhook_health_checks_total", "Webhook subscription checks, by result");
    describe_counter!("webhook_auto_heal_total", "Webhook reinstall attempts, by result");

    info!("Metrics exporter listening on {}", addr);
}
