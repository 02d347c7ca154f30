// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::rate_limit::RateLimitSnapshot;
use async_trait::async_trait;

/// 限流跟踪器特质
///
/// 按账号缓存最近一次观测到的限流快照。超过 TTL 的快照视为不存在。
/// 进程内实现只是性能优化，不作为跨进程的权威状态。
#[async_trait]
pub trait RateLimitTracker: Send + Sync {
    /// 覆盖写入账号的最新快照
    async fn record(&self, account_id: i64, snapshot: RateLimitSnapshot);

    /// 读取账号快照；不存在或已过期返回 None
    async fn get(&self, account_id: i64) -> Option<RateLimitSnapshot>;
}
