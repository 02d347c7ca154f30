// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::remote_api::{value_id, RemoteApiClient};
use super::sync_stats::SyncStatsRecorder;
use crate::domain::models::account::Account;
use crate::domain::models::entity_mapping::{EntityMapping, MappingKey};
use crate::domain::models::sync_task::{
    entity_data, main_account_id_from_payload, EntityType, NewSyncTask, SyncOperation, SyncTask,
};
use crate::domain::repositories::entity_mapping_repository::EntityMappingRepository;
use crate::domain::repositories::sync_task_repository::{
    FailureDetails, RepositoryError, SyncTaskRepository,
};
use crate::utils::time;
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 写入新任务的失败原因最大长度（字符）
const MAX_FAILURE_REASON_CHARS: usize = 500;

/// 分解结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompositionResult {
    /// 新建的单实体任务ID
    pub created: Vec<i64>,
    /// 映射有效、无需重试的实体数
    pub skipped_existing: usize,
    /// 被删除的失效映射数
    pub stale_mappings_removed: usize,
}

/// 批量失败分解器
///
/// 批量任务整体失败时，把其中的实体拆成单独的 create 任务。
/// 已有有效映射的实体说明远端已经生效，不再重试；映射失效的先删除映射。
/// 原批量任务最终标记为失败。
pub struct BatchFailureDecomposer {
    tasks: Arc<dyn SyncTaskRepository>,
    mappings: Arc<dyn EntityMappingRepository>,
    remote: Arc<dyn RemoteApiClient>,
    stats: Arc<dyn SyncStatsRecorder>,
    retry_delay: Duration,
}

impl BatchFailureDecomposer {
    pub fn new(
        tasks: Arc<dyn SyncTaskRepository>,
        mappings: Arc<dyn EntityMappingRepository>,
        remote: Arc<dyn RemoteApiClient>,
        stats: Arc<dyn SyncStatsRecorder>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            tasks,
            mappings,
            remote,
            stats,
            retry_delay,
        }
    }

    /// 分解失败的批量任务
    ///
    /// 失效映射先逐条删除（重复删除无副作用），新任务的写入与原任务的失败
    /// 在同一事务中提交，因此同一批量任务不会被分解两次。
    ///
    /// # 参数
    ///
    /// * `task` - 失败的批量任务
    /// * `account` - 任务所属子账号，用于核对映射
    /// * `failure` - 批量调用的失败原因
    /// * `attempts` - 本次失败后的尝试次数
    /// * `duration_ms` - 本次执行耗时，写入统计
    ///
    /// # 返回值
    ///
    /// 任务已不在 processing 时返回 None，此时没有写入任何新任务
    pub async fn decompose(
        &self,
        task: &SyncTask,
        account: &Account,
        failure: &str,
        attempts: i32,
        duration_ms: u64,
    ) -> Result<Option<DecompositionResult>, RepositoryError> {
        let mut result = DecompositionResult::default();
        let main_account_id = task
            .main_account_id
            .or_else(|| main_account_id_from_payload(&task.payload));

        let (Some(entities), Some(main_account_id)) = (task.embedded_entities(), main_account_id)
        else {
            warn!(
                "Batch task {} has no entities or main_account_id, nothing to recover",
                task.id
            );
            let details = FailureDetails::error(format!("unrecoverable batch failure: {}", failure))
                .with_attempts(attempts);
            if !self.tasks.mark_failed(task.id, details).await? {
                return Ok(None);
            }
            self.record_failure(task, main_account_id, duration_ms).await;
            return Ok(Some(result));
        };

        let item_type = task.entity_type.item_type();
        let reason = truncate(failure, MAX_FAILURE_REASON_CHARS);
        let scheduled_at = time::after(self.retry_delay);
        let mut followups = Vec::new();

        for entity in entities {
            let Some(source_id) = value_id(entity) else {
                warn!("Skipping entity without id in batch task {}", task.id);
                continue;
            };

            let key = MappingKey::new(
                main_account_id,
                task.account_id,
                item_type.clone(),
                source_id.clone(),
            );
            if let Some(mapping) = self.mappings.find(&key).await? {
                if self.mapping_is_live(account, &item_type, &mapping).await {
                    debug!(
                        "Entity {} already exists as {} in account {}",
                        source_id, mapping.child_entity_id, task.account_id
                    );
                    result.skipped_existing += 1;
                    continue;
                }
                self.mappings.delete(mapping.id).await?;
                result.stale_mappings_removed += 1;
            }

            let payload = json!({
                "main_account_id": main_account_id,
                "data": entity_data(entity),
                "original_batch_task_id": task.id,
                "failure_reason": reason,
            });
            followups.push(
                NewSyncTask::new(
                    task.account_id,
                    item_type.clone(),
                    source_id,
                    SyncOperation::Create,
                    payload,
                )
                .with_priority(task.priority)
                .with_max_attempts(task.max_attempts)
                .scheduled_at(scheduled_at),
            );
        }

        let details = FailureDetails::error(format!(
            "batch decomposed into {} tasks: {}",
            followups.len(),
            reason
        ))
        .with_attempts(attempts);

        let Some(created) = self
            .tasks
            .fail_with_followups(task.id, details, &followups)
            .await?
        else {
            warn!(
                "Batch task {} was no longer processing, decomposition discarded",
                task.id
            );
            return Ok(None);
        };
        result.created = created.iter().map(|t| t.id).collect();
        self.record_failure(task, Some(main_account_id), duration_ms)
            .await;

        counter!("sync_batches_decomposed_total").increment(1);
        info!(
            "Decomposed batch task {}: {} created, {} already synced, {} stale mappings removed",
            task.id,
            result.created.len(),
            result.skipped_existing,
            result.stale_mappings_removed
        );

        Ok(Some(result))
    }

    /// 统计写入失败只记录告警，任务状态已经提交
    async fn record_failure(&self, task: &SyncTask, main_account_id: Option<i64>, duration_ms: u64) {
        counter!("sync_tasks_failed_total", "reason" => "batch_decomposed").increment(1);
        if let Err(e) = self
            .stats
            .record_sync(
                main_account_id,
                task.account_id,
                task.entity_type.category(),
                false,
                duration_ms,
            )
            .await
        {
            warn!("Failed to record sync statistics for batch task {}: {}", task.id, e);
        }
    }

    /// 映射的子账号实体仍存在且未归档
    ///
    /// 核对本身失败也视为失效
    async fn mapping_is_live(
        &self,
        account: &Account,
        item_type: &EntityType,
        mapping: &EntityMapping,
    ) -> bool {
        let endpoint = format!("/{}/{}", item_type.resource(), mapping.child_entity_id);
        match self.remote.get(account, &endpoint, &json!({})).await {
            Ok(response) => !response
                .data
                .get("archived")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(e) => {
                debug!(
                    "Verification of {} {} failed: {}",
                    item_type, mapping.child_entity_id, e
                );
                false
            }
        }
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}
