// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::sync_task_repository::RepositoryError;
use async_trait::async_trait;

/// 同步统计记录器
///
/// 每个任务的最终结果记录一次，供运营报表使用
#[async_trait]
pub trait SyncStatsRecorder: Send + Sync {
    async fn record_sync(
        &self,
        main_account_id: Option<i64>,
        child_account_id: i64,
        category: &str,
        success: bool,
        duration_ms: u64,
    ) -> Result<(), RepositoryError>;
}
