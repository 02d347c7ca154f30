// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// 限流快照
///
/// 某个账号最近一次观测到的上游限流状态，由远程调用方在每次响应后写入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// 当前窗口剩余请求数
    pub remaining: i64,
    /// 窗口总配额
    pub limit: i64,
    /// 窗口重置时间（Unix 秒）
    pub reset_timestamp: i64,
    /// 快照采集时间
    pub captured_at: DateTime<Utc>,
}

impl RateLimitSnapshot {
    pub fn new(remaining: i64, limit: i64, reset_timestamp: i64) -> Self {
        Self {
            remaining,
            limit,
            reset_timestamp,
            captured_at: Utc::now(),
        }
    }

    /// 超过 TTL 的快照视为不存在
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.captured_at);
        age.to_std().map(|age| age > ttl).unwrap_or(false)
    }

    /// 距离窗口重置的时间，已重置则为零
    pub fn reset_in(&self, now: DateTime<Utc>) -> Duration {
        let secs = self.reset_timestamp - now.timestamp();
        Duration::from_secs(secs.max(0) as u64)
    }

    /// 配额已耗尽且窗口尚未重置
    pub fn is_exhausted(&self, now: DateTime<Utc>) -> bool {
        self.remaining <= 0 && self.reset_timestamp > now.timestamp()
    }
}

/// 限流作用范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// 主账号整体配额即将耗尽，影响该主账号的所有任务
    Global,
    /// 仅当前接口被限流
    Endpoint,
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RateLimitScope::Global => write!(f, "global"),
            RateLimitScope::Endpoint => write!(f, "endpoint"),
        }
    }
}

/// 限流信号
///
/// 远程调用方在收到 429（或预判配额耗尽）时抛出，调度器据此重新安排任务。
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSignal {
    /// 建议的重试等待时间
    pub retry_after: Duration,
    /// 触发信号时的快照；响应未携带限流头时为空
    pub snapshot: Option<RateLimitSnapshot>,
    /// 被限流的接口
    pub endpoint: String,
}

impl RateLimitSignal {
    pub fn new(
        retry_after: Duration,
        snapshot: Option<RateLimitSnapshot>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            retry_after,
            snapshot,
            endpoint: endpoint.into(),
        }
    }

    /// 判断限流范围：剩余配额不超过阈值视为全局耗尽。
    /// 没有快照时无法判断配额，按接口级处理。
    pub fn scope(&self, global_threshold: i64) -> RateLimitScope {
        match &self.snapshot {
            Some(snapshot) if snapshot.remaining <= global_threshold => RateLimitScope::Global,
            _ => RateLimitScope::Endpoint,
        }
    }

    /// 写入任务 `rate_limit_info` 字段的诊断信息
    pub fn to_info(&self) -> Value {
        json!({
            "retry_after_secs": self.retry_after.as_secs(),
            "endpoint": self.endpoint,
            "remaining": self.snapshot.as_ref().map(|s| s.remaining),
            "limit": self.snapshot.as_ref().map(|s| s.limit),
            "reset_timestamp": self.snapshot.as_ref().map(|s| s.reset_timestamp),
        })
    }
}

impl fmt::Display for RateLimitSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rate limited on {} (retry after {}s",
            self.endpoint,
            self.retry_after.as_secs()
        )?;
        if let Some(snapshot) = &self.snapshot {
            write!(f, ", remaining {}/{}", snapshot.remaining, snapshot.limit)?;
        }
        write!(f, ")")
    }
}
