// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook_health::AccountHealthReport;
use async_trait::async_trait;
use tracing::error;

/// 健康告警通知
#[async_trait]
pub trait HealthAlertNotifier: Send + Sync {
    /// 账号健康为 critical 时调用，无论是否修复成功
    async fn notify_critical(&self, report: &AccountHealthReport, healed: bool);
}

/// 写日志的默认通知实现
#[derive(Debug, Default, Clone)]
pub struct LogHealthNotifier;

#[async_trait]
impl HealthAlertNotifier for LogHealthNotifier {
    async fn notify_critical(&self, report: &AccountHealthReport, healed: bool) {
        let broken: Vec<&str> = report
            .subscriptions
            .iter()
            .filter(|s| !s.is_active || s.check_attempts > 0)
            .map(|s| s.topic.as_str())
            .collect();

        error!(
            account_id = report.account_id,
            healed,
            missing = ?report.missing,
            broken = ?broken,
            "ALARM: webhook health critical for account {}",
            report.account_id
        );
    }
}
