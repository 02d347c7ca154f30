// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::account::Account;
use crate::domain::models::rate_limit::{RateLimitSignal, RateLimitSnapshot};
use crate::domain::services::rate_limit_tracker::RateLimitTracker;
use crate::domain::services::remote_api::{RemoteApiClient, RemoteError, RemoteResponse};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RETRY_AFTER: &str = "retry-after";

/// 小于该值的重置时间按"距今秒数"解释，否则按 Unix 时间戳
const RESET_DELTA_THRESHOLD: i64 = 1_000_000_000;

/// 错误信息最大长度
const MAX_ERROR_BODY_CHARS: usize = 500;

/// 基于 reqwest 的远程 API 客户端
///
/// 每个响应的限流头都会写入限流跟踪器，配额按主账号归集（子账号归到其上级）。
/// 跟踪器显示配额已耗尽且尚未重置时，直接返回限流信号而不发请求。
#[derive(Clone)]
pub struct HttpRemoteClient {
    client: Client,
    base_url: Url,
    tracker: Arc<dyn RateLimitTracker>,
    default_retry_after: Duration,
}

impl HttpRemoteClient {
    /// 创建新的远程客户端
    ///
    /// # 参数
    ///
    /// * `base_url` - API 根地址
    /// * `timeout` - 单次请求超时
    /// * `tracker` - 限流跟踪器
    /// * `default_retry_after` - 429 响应未带 Retry-After 时的默认等待
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tracker: Arc<dyn RateLimitTracker>,
        default_retry_after: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::InvalidResponse(format!("invalid base url: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(error_chain(&e)))?;

        Ok(Self {
            client,
            base_url,
            tracker,
            default_retry_after,
        })
    }

    /// 配额归属的账号
    fn quota_account_id(account: &Account) -> i64 {
        account.parent_account_id.unwrap_or(account.id)
    }

    fn url(&self, endpoint: &str) -> Result<Url, RemoteError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| RemoteError::InvalidResponse(format!("invalid url: {}", e)))
    }

    /// 配额已耗尽时不发请求
    async fn ensure_quota(&self, account: &Account, endpoint: &str) -> Result<(), RemoteError> {
        let quota_account = Self::quota_account_id(account);
        if let Some(snapshot) = self.tracker.get(quota_account).await {
            let now = Utc::now();
            if snapshot.is_exhausted(now) {
                debug!(
                    "Quota for account {} exhausted until {}, not calling {}",
                    quota_account, snapshot.reset_timestamp, endpoint
                );
                counter!("sync_remote_preemptive_throttle_total").increment(1);
                let retry_after = snapshot.reset_in(now);
                return Err(RemoteError::RateLimited(RateLimitSignal::new(
                    retry_after,
                    Some(snapshot),
                    endpoint,
                )));
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        account: &Account,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<RemoteResponse, RemoteError> {
        self.ensure_quota(account, endpoint).await?;

        let response = request
            .bearer_auth(&account.api_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Network(format!("request timed out: {}", error_chain(&e)))
                } else {
                    RemoteError::Network(error_chain(&e))
                }
            })?;

        let status = response.status();
        let snapshot = parse_snapshot(response.headers());
        if let Some(snapshot) = &snapshot {
            self.tracker
                .record(Self::quota_account_id(account), snapshot.clone())
                .await;
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers())
                .or_else(|| snapshot.as_ref().map(|s| s.reset_in(Utc::now())))
                .filter(|d| !d.is_zero())
                .unwrap_or(self.default_retry_after);
            warn!(
                "Rate limited on {} for account {}, retry after {}s",
                endpoint,
                account.id,
                retry_after.as_secs()
            );
            return Err(RemoteError::RateLimited(RateLimitSignal::new(
                retry_after,
                snapshot,
                endpoint,
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Network(error_chain(&e)))?;

        if !status.is_success() {
            return Err(RemoteError::Http {
                status: status.as_u16(),
                message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)
                .map_err(|e| RemoteError::InvalidResponse(format!("{}: {}", endpoint, e)))?
        };

        Ok(RemoteResponse::new(status.as_u16(), data))
    }
}

#[async_trait]
impl RemoteApiClient for HttpRemoteClient {
    async fn get(
        &self,
        account: &Account,
        endpoint: &str,
        params: &Value,
    ) -> Result<RemoteResponse, RemoteError> {
        let url = self.url(endpoint)?;
        let request = self.client.get(url).query(&query_pairs(params));
        self.send(account, endpoint, request).await
    }

    async fn post(
        &self,
        account: &Account,
        endpoint: &str,
        params: &Value,
    ) -> Result<RemoteResponse, RemoteError> {
        let url = self.url(endpoint)?;
        let request = self.client.post(url).json(params);
        self.send(account, endpoint, request).await
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .map(|v| v as i64)
}

/// 从响应头解析限流快照；剩余数和总配额都存在才算有效
pub fn parse_snapshot(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let remaining = header_i64(headers, HEADER_REMAINING)?;
    let limit = header_i64(headers, HEADER_LIMIT)?;
    let now = Utc::now().timestamp();
    let reset_timestamp = match header_i64(headers, HEADER_RESET) {
        Some(reset) if reset < RESET_DELTA_THRESHOLD => now + reset,
        Some(reset) => reset,
        None => now,
    };
    Some(RateLimitSnapshot::new(remaining, limit, reset_timestamp))
}

/// 解析 Retry-After（秒）
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = header_i64(headers, HEADER_RETRY_AFTER)?;
    Some(Duration::from_secs(secs.max(0) as u64))
}

/// GET 参数：对象的每个字段转为查询参数
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(object) = params.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

/// 展开错误链，底层原因（如 "Connection refused"）才可用于分类
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
