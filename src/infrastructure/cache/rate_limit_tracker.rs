// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::rate_limit::RateLimitSnapshot;
use crate::domain::services::rate_limit_tracker::RateLimitTracker;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

/// 进程内限流跟踪器
///
/// 过期快照在读取时移除
pub struct InMemoryRateLimitTracker {
    snapshots: DashMap<i64, RateLimitSnapshot>,
    ttl: Duration,
}

impl InMemoryRateLimitTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshots: DashMap::new(),
            ttl,
        }
    }
}

#[async_trait]
impl RateLimitTracker for InMemoryRateLimitTracker {
    async fn record(&self, account_id: i64, snapshot: RateLimitSnapshot) {
        self.snapshots.insert(account_id, snapshot);
    }

    async fn get(&self, account_id: i64) -> Option<RateLimitSnapshot> {
        let snapshot = self.snapshots.get(&account_id)?.clone();
        if snapshot.is_stale(self.ttl, Utc::now()) {
            self.snapshots.remove(&account_id);
            return None;
        }
        Some(snapshot)
    }
}

/// Redis 限流跟踪器
///
/// 多进程共享快照，依赖 `SET EX` 过期。Redis 不可用时读写都降级为无快照。
#[derive(Clone)]
pub struct RedisRateLimitTracker {
    client: redis::Client,
    ttl: Duration,
    key_prefix: String,
}

impl RedisRateLimitTracker {
    /// 创建 Redis 限流跟踪器
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    /// * `ttl` - 快照有效期
    pub fn new(redis_url: &str, ttl: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl,
            key_prefix: "syncrs:rate_limit".to_string(),
        })
    }

    fn key(&self, account_id: i64) -> String {
        format!("{}:{}", self.key_prefix, account_id)
    }

    async fn write(&self, account_id: i64, snapshot: &RateLimitSnapshot) -> anyhow::Result<()> {
        let value = serde_json::to_string(snapshot)?;
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.set_ex::<_, _, ()>(self.key(account_id), value, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn read(&self, account_id: i64) -> anyhow::Result<Option<RateLimitSnapshot>> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = con.get(self.key(account_id)).await?;
        match value {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RateLimitTracker for RedisRateLimitTracker {
    async fn record(&self, account_id: i64, snapshot: RateLimitSnapshot) {
        if let Err(e) = self.write(account_id, &snapshot).await {
            warn!("Failed to store rate limit snapshot for {}: {}", account_id, e);
        }
    }

    async fn get(&self, account_id: i64) -> Option<RateLimitSnapshot> {
        match self.read(account_id).await {
            Ok(snapshot) => snapshot.filter(|s| !s.is_stale(self.ttl, Utc::now())),
            Err(e) => {
                warn!("Failed to read rate limit snapshot for {}: {}", account_id, e);
                None
            }
        }
    }
}
