// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::health_notifier::HealthAlertNotifier;
use super::remote_api::{value_id, RemoteApiClient};
use crate::domain::models::account::Account;
use crate::domain::models::webhook_health::{
    aggregate_health, expected_subscriptions, AccountHealthReport, AccountHealthStatus,
    HealthPolicy, SubscriptionHealth, SubscriptionKey, WebhookHealthRecord,
};
use crate::domain::repositories::account_repository::AccountRepository;
use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::domain::repositories::webhook_health_repository::WebhookHealthRepository;
use crate::utils::time;
use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// 健康检查错误
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Account {0} not found")]
    AccountNotFound(i64),
}

/// 健康检查配置
#[derive(Debug, Clone)]
pub struct WebhookHealthConfig {
    pub policy: HealthPolicy,
    /// 重新安装订阅时注册的回调地址
    pub callback_url: String,
}

/// 一次修复的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealOutcome {
    pub healed: u32,
    pub failed: u32,
}

/// 一轮全量检查的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthRunSummary {
    pub accounts_checked: u32,
    pub healthy: u32,
    pub warning: u32,
    pub degraded: u32,
    pub critical: u32,
    pub healed: u32,
    pub heal_failed: u32,
    /// 检查过程本身出错的账号
    pub errors: u32,
}

impl HealthRunSummary {
    fn count(&mut self, status: AccountHealthStatus) {
        match status {
            AccountHealthStatus::Healthy => self.healthy += 1,
            AccountHealthStatus::Warning => self.warning += 1,
            AccountHealthStatus::Degraded => self.degraded += 1,
            AccountHealthStatus::Critical => self.critical += 1,
        }
    }
}

/// Webhook 健康监控
///
/// 逐个账号核对预期订阅在远端是否存在且活跃，更新健康记录并汇总账号健康状态。
/// 账号变为 critical 时可自动重新安装缺失或损坏的订阅，并始终发出告警。
pub struct WebhookHealthMonitor {
    accounts: Arc<dyn AccountRepository>,
    records: Arc<dyn WebhookHealthRepository>,
    remote: Arc<dyn RemoteApiClient>,
    notifier: Arc<dyn HealthAlertNotifier>,
    config: WebhookHealthConfig,
}

impl WebhookHealthMonitor {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        records: Arc<dyn WebhookHealthRepository>,
        remote: Arc<dyn RemoteApiClient>,
        notifier: Arc<dyn HealthAlertNotifier>,
        config: WebhookHealthConfig,
    ) -> Self {
        Self {
            accounts,
            records,
            remote,
            notifier,
            config,
        }
    }

    /// 检查单个订阅并保存结果
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(record))` - 更新后的健康记录
    /// * `Ok(None)` - 该订阅没有健康记录（从未安装）
    pub async fn check_subscription(
        &self,
        account: &Account,
        key: &SubscriptionKey,
    ) -> Result<Option<WebhookHealthRecord>, HealthError> {
        let Some(mut record) = self.records.find(account.id, key).await? else {
            return Ok(None);
        };

        self.verify_record(account, &mut record).await;
        let saved = self.records.save(&record).await?;
        Ok(Some(saved))
    }

    async fn verify_record(&self, account: &Account, record: &mut WebhookHealthRecord) {
        let now = time::now();

        let Some(remote_id) = record.remote_webhook_id.clone() else {
            record.mark_inactive("subscription not installed", now);
            counter!("webhook_health_checks_total", "result" => "inactive").increment(1);
            return;
        };

        let endpoint = format!("/webhooks/{}", remote_id);
        match self.remote.get(account, &endpoint, &json!({})).await {
            Ok(response) => {
                let active = response
                    .data
                    .get("active")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                if active {
                    record.mark_healthy(now);
                    counter!("webhook_health_checks_total", "result" => "healthy").increment(1);
                } else {
                    record.mark_inactive("subscription inactive on remote", now);
                    counter!("webhook_health_checks_total", "result" => "inactive").increment(1);
                }
            }
            Err(e) if e.is_not_found() => {
                record.mark_inactive("subscription missing on remote", now);
                counter!("webhook_health_checks_total", "result" => "inactive").increment(1);
            }
            Err(e) => {
                warn!(
                    "Health check for {} on account {} failed: {}",
                    record.key(),
                    account.id,
                    e
                );
                record.mark_check_failed(e.to_string(), now);
                counter!("webhook_health_checks_total", "result" => "error").increment(1);
            }
        }
    }

    /// 检查账号的全部订阅并返回报告
    pub async fn check_account(&self, account: &Account) -> Result<AccountHealthReport, HealthError> {
        let records = self.records.find_by_account(account.id).await?;

        // 远端核对并发进行，保存按顺序
        let verified = join_all(records.into_iter().map(|mut record| async move {
            self.verify_record(account, &mut record).await;
            record
        }))
        .await;

        let mut checked = Vec::with_capacity(verified.len());
        for record in &verified {
            checked.push(self.records.save(record).await?);
        }

        Ok(self.build_report(account, &checked))
    }

    /// 只读报告，不访问远端
    pub async fn report(&self, account_id: i64) -> Result<AccountHealthReport, HealthError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(HealthError::AccountNotFound(account_id))?;
        let records = self.records.find_by_account(account_id).await?;
        Ok(self.build_report(&account, &records))
    }

    /// 所有启用账号的只读报告
    pub async fn report_all(&self) -> Result<Vec<AccountHealthReport>, HealthError> {
        let accounts = self.accounts.find_active().await?;
        let mut reports = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let records = self.records.find_by_account(account.id).await?;
            reports.push(self.build_report(account, &records));
        }
        Ok(reports)
    }

    fn build_report(&self, account: &Account, records: &[WebhookHealthRecord]) -> AccountHealthReport {
        let expected = expected_subscriptions(account);
        let status = aggregate_health(records, &expected, &self.config.policy, time::now());
        let missing = expected
            .iter()
            .filter(|key| !records.iter().any(|r| &r.key() == *key))
            .map(|key| key.topic())
            .collect();

        AccountHealthReport {
            account_id: account.id,
            status,
            subscriptions: records.iter().map(SubscriptionHealth::from).collect(),
            missing,
        }
    }

    /// 重新安装缺失或越过阈值的订阅
    pub async fn heal(&self, account: &Account) -> Result<HealOutcome, HealthError> {
        let mut outcome = HealOutcome::default();
        let records = self.records.find_by_account(account.id).await?;

        for key in expected_subscriptions(account) {
            let existing = records.iter().find(|r| r.key() == key).cloned();
            let broken = existing
                .as_ref()
                .map(|record| record.needs_repair(&self.config.policy))
                .unwrap_or(true);
            if !broken {
                continue;
            }

            let now = time::now();
            let mut record =
                existing.unwrap_or_else(|| WebhookHealthRecord::pending(account.id, &key, now));
            let body = json!({
                "topic": key.topic(),
                "address": self.config.callback_url,
            });

            match self.remote.post(account, "/webhooks", &body).await {
                Ok(response) => {
                    record.remote_webhook_id = value_id(&response.data);
                    record.mark_healthy(now);
                    self.records.save(&record).await?;
                    outcome.healed += 1;
                    counter!("webhook_auto_heal_total", "result" => "success").increment(1);
                    info!("Reinstalled webhook {} for account {}", key, account.id);
                }
                Err(e) => {
                    outcome.failed += 1;
                    counter!("webhook_auto_heal_total", "result" => "failure").increment(1);
                    warn!(
                        "Failed to reinstall webhook {} for account {}: {}",
                        key, account.id, e
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// 检查所有启用账号，必要时自动修复
    pub async fn run(&self, auto_heal: bool) -> Result<HealthRunSummary, HealthError> {
        let accounts = self.accounts.find_active().await?;
        let mut summary = HealthRunSummary::default();

        for account in &accounts {
            summary.accounts_checked += 1;

            let report = match self.check_account(account).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Health check for account {} failed: {}", account.id, e);
                    summary.errors += 1;
                    continue;
                }
            };
            summary.count(report.status);

            if report.status != AccountHealthStatus::Critical {
                continue;
            }

            let mut healed = false;
            if auto_heal {
                match self.heal(account).await {
                    Ok(outcome) => {
                        summary.healed += outcome.healed;
                        summary.heal_failed += outcome.failed;
                        healed = outcome.failed == 0 && outcome.healed > 0;
                    }
                    Err(e) => {
                        error!("Auto-heal for account {} failed: {}", account.id, e);
                        summary.errors += 1;
                    }
                }
            }

            self.notifier.notify_critical(&report, healed).await;
        }

        info!(
            "Webhook health run: {} accounts, {} critical, {} healed, {} heal failures",
            summary.accounts_checked, summary.critical, summary.healed, summary.heal_failed
        );

        Ok(summary)
    }
}
