// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::account::Account;
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Webhook 订阅健康记录
///
/// 每个 (account, entity_type, action) 一条。安装订阅时创建，每次健康检查后更新：
/// 成功时重置为健康，检查出错时累加尝试次数，远端订阅缺失或停用时标记为不活跃。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookHealthRecord {
    pub id: i64,
    pub account_id: i64,
    pub entity_type: String,
    pub action: String,
    /// 远端订阅ID；为空表示尚未安装
    pub remote_webhook_id: Option<String>,
    pub is_active: bool,
    /// 连续失败的检查次数
    pub check_attempts: i32,
    pub last_check_at: Option<DateTime<FixedOffset>>,
    pub last_success_at: Option<DateTime<FixedOffset>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl WebhookHealthRecord {
    /// 新建一条尚未安装的记录（id 由存储层分配）
    pub fn pending(account_id: i64, key: &SubscriptionKey, now: DateTime<FixedOffset>) -> Self {
        Self {
            id: 0,
            account_id,
            entity_type: key.entity_type.clone(),
            action: key.action.clone(),
            remote_webhook_id: None,
            is_active: false,
            check_attempts: 0,
            last_check_at: None,
            last_success_at: None,
            error_message: Some("subscription not installed".to_string()),
            created_at: now,
        }
    }

    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(&self.entity_type, &self.action)
    }

    /// 远端确认订阅存在且活跃
    pub fn mark_healthy(&mut self, now: DateTime<FixedOffset>) {
        self.is_active = true;
        self.check_attempts = 0;
        self.error_message = None;
        self.last_check_at = Some(now);
        self.last_success_at = Some(now);
    }

    /// 检查本身失败（网络、5xx、限流），订阅状态未知
    pub fn mark_check_failed(&mut self, error: impl Into<String>, now: DateTime<FixedOffset>) {
        self.check_attempts += 1;
        self.error_message = Some(error.into());
        self.last_check_at = Some(now);
    }

    /// 远端订阅缺失或已停用
    pub fn mark_inactive(&mut self, error: impl Into<String>, now: DateTime<FixedOffset>) {
        self.is_active = false;
        self.check_attempts += 1;
        self.error_message = Some(error.into());
        self.last_check_at = Some(now);
    }

    pub fn is_healthy(&self) -> bool {
        self.is_active && self.check_attempts == 0
    }

    /// 是否越过了需要修复的阈值
    pub fn needs_repair(&self, policy: &HealthPolicy) -> bool {
        !self.is_active || self.check_attempts >= policy.critical_attempts
    }
}

/// 订阅标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub entity_type: String,
    pub action: String,
}

impl SubscriptionKey {
    pub fn new(entity_type: &str, action: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            action: action.to_string(),
        }
    }

    /// 远端的 topic 写法，例如 `products/update`
    pub fn topic(&self) -> String {
        format!("{}/{}", self.entity_type, self.action)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.action)
    }
}

/// 账号应当持有的订阅集合
///
/// 主账号监听商品目录变更，子账号监听订单。
pub fn expected_subscriptions(account: &Account) -> Vec<SubscriptionKey> {
    let pairs: &[(&str, &str)] = if account.is_main() {
        &[
            ("products", "create"),
            ("products", "update"),
            ("products", "delete"),
            ("variants", "create"),
            ("variants", "update"),
            ("variants", "delete"),
        ]
    } else {
        &[("orders", "create"), ("orders", "update")]
    };

    pairs
        .iter()
        .map(|(entity_type, action)| SubscriptionKey::new(entity_type, action))
        .collect()
}

/// 健康判定阈值
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    /// 连续失败多少次视为严重
    pub critical_attempts: i32,
    /// 多久没有成功检查视为告警
    pub stale_after: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            critical_attempts: 3,
            stale_after: Duration::hours(24),
        }
    }
}

/// 账号整体健康状态，按严重程度递增排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountHealthStatus {
    Healthy,
    Warning,
    Degraded,
    Critical,
}

impl fmt::Display for AccountHealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccountHealthStatus::Healthy => write!(f, "healthy"),
            AccountHealthStatus::Warning => write!(f, "warning"),
            AccountHealthStatus::Degraded => write!(f, "degraded"),
            AccountHealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// 汇总一个账号的健康状态
///
/// - critical：有预期订阅没有记录，或有记录不活跃，或连续失败达到阈值
/// - degraded：有记录出现过失败但仍活跃
/// - warning：全部健康，但有记录从未成功检查或成功检查已过期
/// - healthy：其余情况
pub fn aggregate_health(
    records: &[WebhookHealthRecord],
    expected: &[SubscriptionKey],
    policy: &HealthPolicy,
    now: DateTime<FixedOffset>,
) -> AccountHealthStatus {
    let missing = expected
        .iter()
        .any(|key| !records.iter().any(|r| &r.key() == key));

    if missing || records.iter().any(|r| r.needs_repair(policy)) {
        return AccountHealthStatus::Critical;
    }

    if records.iter().any(|r| r.check_attempts > 0) {
        return AccountHealthStatus::Degraded;
    }

    let stale = records.iter().any(|r| match r.last_success_at {
        Some(at) => now.signed_duration_since(at) > policy.stale_after,
        None => true,
    });

    if stale {
        AccountHealthStatus::Warning
    } else {
        AccountHealthStatus::Healthy
    }
}

/// 单个订阅的健康明细
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionHealth {
    pub topic: String,
    pub remote_webhook_id: Option<String>,
    pub is_active: bool,
    pub check_attempts: i32,
    pub last_check_at: Option<DateTime<FixedOffset>>,
    pub last_success_at: Option<DateTime<FixedOffset>>,
    pub error_message: Option<String>,
}

impl From<&WebhookHealthRecord> for SubscriptionHealth {
    fn from(record: &WebhookHealthRecord) -> Self {
        Self {
            topic: record.key().topic(),
            remote_webhook_id: record.remote_webhook_id.clone(),
            is_active: record.is_active,
            check_attempts: record.check_attempts,
            last_check_at: record.last_check_at,
            last_success_at: record.last_success_at,
            error_message: record.error_message.clone(),
        }
    }
}

/// 账号健康报告
#[derive(Debug, Clone, Serialize)]
pub struct AccountHealthReport {
    pub account_id: i64,
    pub status: AccountHealthStatus,
    pub subscriptions: Vec<SubscriptionHealth>,
    /// 预期存在但没有任何记录的订阅
    pub missing: Vec<String>,
}
