// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::remote_api::RemoteError;
use crate::sync::traits::SyncError;
use std::time::Duration;

/// 错误分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 暂时性失败，消耗一次尝试后按退避重试
    Retryable,
    /// 重试无意义，直接失败
    Permanent,
}

/// 可识别的网络层错误片段
const RETRYABLE_MESSAGE_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection refused",
    "connection reset",
    "dns",
    "name resolution",
    "unreachable",
];

/// 错误信息中是否含有可识别的网络层错误
pub fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// 远程错误分类
///
/// 5xx 与网络错误可重试，4xx 永久失败，无法识别的一律不重试
pub fn classify_remote_error(error: &RemoteError) -> ErrorClass {
    match error {
        // 调度器在分类之前处理限流
        RemoteError::RateLimited(_) => ErrorClass::Retryable,
        RemoteError::Http { status, .. } if (500..=599).contains(status) => ErrorClass::Retryable,
        RemoteError::Http { .. } => ErrorClass::Permanent,
        RemoteError::Network(message) | RemoteError::InvalidResponse(message) => {
            if is_retryable_message(message) {
                ErrorClass::Retryable
            } else {
                ErrorClass::Permanent
            }
        }
    }
}

/// 同步错误分类
pub fn classify_error(error: &SyncError) -> ErrorClass {
    match error {
        SyncError::Remote(remote) => classify_remote_error(remote),
        // 本地存储故障通常是暂时的
        SyncError::Repository(_) => ErrorClass::Retryable,
        SyncError::UnknownEntityType(_)
        | SyncError::MissingAccount(_)
        | SyncError::InvalidPayload(_) => ErrorClass::Permanent,
    }
}

/// 线性退避重试策略
///
/// 第 N 次失败后等待 `backoff_step × N`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_step: Duration::from_secs(5 * 60),
        }
    }
}

impl RetryPolicy {
    pub fn new(backoff_step: Duration) -> Self {
        Self { backoff_step }
    }

    /// 第 `attempts` 次失败后的等待时间
    pub fn backoff(&self, attempts: i32) -> Duration {
        self.backoff_step * attempts.max(1) as u32
    }

    /// 可重试且尝试次数未用尽
    pub fn should_retry(&self, class: ErrorClass, attempts: i32, max_attempts: i32) -> bool {
        class == ErrorClass::Retryable && attempts < max_attempts
    }
}
