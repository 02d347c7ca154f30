// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::domain::services::sync_stats::SyncStatsRecorder;
use crate::infrastructure::database::entities::sync_statistic;
use crate::utils::time;
use async_trait::async_trait;
use metrics::histogram;
use sea_orm::{ActiveModelTrait, DatabaseConnection, NotSet, Set};
use std::sync::Arc;

/// 同步统计仓库实现
///
/// 每条结果写一行，同时记录耗时直方图
#[derive(Clone)]
pub struct SyncStatisticsRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SyncStatisticsRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncStatsRecorder for SyncStatisticsRepositoryImpl {
    async fn record_sync(
        &self,
        main_account_id: Option<i64>,
        child_account_id: i64,
        category: &str,
        success: bool,
        duration_ms: u64,
    ) -> Result<(), RepositoryError> {
        sync_statistic::ActiveModel {
            id: NotSet,
            main_account_id: Set(main_account_id),
            child_account_id: Set(child_account_id),
            category: Set(category.to_string()),
            success: Set(success),
            duration_ms: Set(i64::try_from(duration_ms).unwrap_or(i64::MAX)),
            recorded_at: Set(time::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        histogram!(
            "sync_task_duration_seconds",
            "category" => category.to_string(),
            "success" => success.to_string()
        )
        .record(duration_ms as f64 / 1000.0);

        Ok(())
    }
}
