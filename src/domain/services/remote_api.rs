// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::account::Account;
use crate::domain::models::rate_limit::RateLimitSignal;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 远程调用错误
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// 上游限流（429 或预判配额耗尽）
    #[error("{0}")]
    RateLimited(RateLimitSignal),

    /// 非 2xx 响应
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 网络层错误（超时、连接失败、DNS 等）
    #[error("Network error: {0}")]
    Network(String),

    /// 响应无法解析
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// HTTP 状态码（仅 Http 变体有）
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Http { status, .. } => Some(*status),
            RemoteError::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// 远程响应
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub data: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self { status, data }
    }

    /// 响应体中的 `id` 字段，兼容数字和字符串
    pub fn id(&self) -> Option<String> {
        value_id(&self.data)
    }
}

/// 读取 JSON 对象的 `id` 字段为字符串
pub fn value_id(value: &Value) -> Option<String> {
    value_field(value, "id")
}

/// 读取 JSON 对象的字段为字符串，兼容数字
pub fn value_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 远程 API 客户端特质
///
/// 所有调用都在某个账号的上下文中进行。实现方负责在每次响应后
/// 记录限流快照，并在 429 时返回 `RemoteError::RateLimited`。
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    async fn get(
        &self,
        account: &Account,
        endpoint: &str,
        params: &Value,
    ) -> Result<RemoteResponse, RemoteError>;

    async fn post(
        &self,
        account: &Account,
        endpoint: &str,
        params: &Value,
    ) -> Result<RemoteResponse, RemoteError>;
}
