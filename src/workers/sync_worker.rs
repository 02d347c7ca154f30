// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::account::{AccountCache, SettingsCache};
use crate::domain::models::rate_limit::{RateLimitScope, RateLimitSignal};
use crate::domain::models::sync_task::SyncTask;
use crate::domain::repositories::account_repository::AccountRepository;
use crate::domain::repositories::sync_task_repository::{FailureDetails, RepositoryError};
use crate::domain::services::batch_decomposer::BatchFailureDecomposer;
use crate::domain::services::sync_stats::SyncStatsRecorder;
use crate::queue::fairness::{balance_by_main_account, fairness_key};
use crate::queue::task_queue::{QueueError, SyncQueue};
use crate::sync::dispatcher::TaskDispatcher;
use crate::sync::traits::{HandlerOutcome, SyncError};
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::{classify_error, ErrorClass, RetryPolicy};
use crate::workers::worker::Worker;

/// 同步工作器配置
#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    /// 轮询间隔
    pub interval: Duration,
    /// 每批最多领取的任务数
    pub batch_size: u64,
    /// 单批处理的总超时
    pub batch_timeout: Duration,
    /// 剩余配额不超过该值视为主账号全局耗尽
    pub global_exhaustion_threshold: i64,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 50,
            batch_timeout: Duration::from_secs(240),
            global_exhaustion_threshold: 1,
        }
    }
}

/// 单个任务的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Rescheduled,
    Failed,
    Decomposed,
    /// 任务状态已被其它实例改变，本次不做任何记录
    Lost,
}

/// 一轮批处理的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub claimed: usize,
    pub completed: usize,
    pub rescheduled: usize,
    pub failed: usize,
    pub decomposed: usize,
    /// 因主账号全局耗尽被批量推迟的 pending 任务数
    pub postponed: u64,
    /// 处理过程中出现存储错误的任务数
    pub errors: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed += 1,
            TaskOutcome::Rescheduled => self.rescheduled += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Decomposed => self.decomposed += 1,
            TaskOutcome::Lost => {}
        }
    }
}

/// 同步调度工作器
///
/// 每轮领取一批到期任务，按主账号公平重排后逐个分发，并根据结果完成、
/// 重新排期或失败。批内维护一个已耗尽主账号集合：某主账号触发全局限流后，
/// 本批中属于它的其余任务不再调用远端，直接按记录的等待时间放回队列。
pub struct SyncWorker {
    queue: Arc<dyn SyncQueue>,
    dispatcher: Arc<TaskDispatcher>,
    accounts: Arc<dyn AccountRepository>,
    decomposer: Arc<BatchFailureDecomposer>,
    stats: Arc<dyn SyncStatsRecorder>,
    retry_policy: RetryPolicy,
    config: SyncWorkerConfig,
}

impl SyncWorker {
    /// 创建新的同步工作器实例
    ///
    /// # 参数
    ///
    /// * `queue` - 同步任务队列
    /// * `dispatcher` - 任务分发器
    /// * `accounts` - 账号仓库，用于批次预加载
    /// * `decomposer` - 批量任务失败分解器
    /// * `stats` - 同步统计
    /// * `retry_policy` - 重试退避策略
    /// * `config` - 工作器配置
    pub fn new(
        queue: Arc<dyn SyncQueue>,
        dispatcher: Arc<TaskDispatcher>,
        accounts: Arc<dyn AccountRepository>,
        decomposer: Arc<BatchFailureDecomposer>,
        stats: Arc<dyn SyncStatsRecorder>,
        retry_policy: RetryPolicy,
        config: SyncWorkerConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            accounts,
            decomposer,
            stats,
            retry_policy,
            config,
        }
    }

    /// 带总超时执行一轮
    ///
    /// 超时后仍在 processing 的任务由队列的卡住任务回收机制重新领取
    pub async fn run_cycle(&self) -> Result<BatchReport, WorkerError> {
        match tokio::time::timeout(self.config.batch_timeout, self.process_batch()).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(self.config.batch_timeout)),
        }
    }

    /// 领取并处理一批任务
    pub async fn process_batch(&self) -> Result<BatchReport, WorkerError> {
        let claimed = self.queue.claim(self.config.batch_size).await?;
        let mut report = BatchReport {
            claimed: claimed.len(),
            ..Default::default()
        };
        if claimed.is_empty() {
            debug!("No sync tasks due");
            return Ok(report);
        }
        counter!("sync_tasks_claimed_total").increment(claimed.len() as u64);

        let tasks = balance_by_main_account(claimed);
        let (accounts, settings) = self.preload(&tasks).await?;
        let mut exhausted: HashMap<i64, Duration> = HashMap::new();

        for task in &tasks {
            match self
                .process_task(task, &accounts, &settings, &mut exhausted, &mut report)
                .await
            {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!("Failed to finalize sync task {}: {}", task.id, e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "Sync batch done: claimed={} completed={} rescheduled={} failed={} decomposed={} postponed={}",
            report.claimed,
            report.completed,
            report.rescheduled,
            report.failed,
            report.decomposed,
            report.postponed
        );
        Ok(report)
    }

    /// 一次性加载批次引用的子账号、主账号和子账号设置
    async fn preload(&self, tasks: &[SyncTask]) -> Result<(AccountCache, SettingsCache), WorkerError> {
        let child_ids: HashSet<i64> = tasks.iter().map(|t| t.account_id).collect();
        let mut ids: HashSet<i64> = child_ids.clone();
        ids.extend(tasks.iter().filter_map(fairness_key));

        let ids: Vec<i64> = ids.into_iter().collect();
        let child_ids: Vec<i64> = child_ids.into_iter().collect();

        let accounts = self
            .accounts
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        let settings = self
            .accounts
            .find_settings(&child_ids)
            .await?
            .into_iter()
            .map(|s| (s.account_id, s))
            .collect();

        Ok((accounts, settings))
    }

    #[instrument(
        skip(self, task, accounts, settings, exhausted, report),
        fields(task_id = %task.id, entity_type = %task.entity_type, account_id = %task.account_id)
    )]
    async fn process_task(
        &self,
        task: &SyncTask,
        accounts: &AccountCache,
        settings: &SettingsCache,
        exhausted: &mut HashMap<i64, Duration>,
        report: &mut BatchReport,
    ) -> Result<TaskOutcome, WorkerError> {
        let main_account_id = fairness_key(task);

        if let Some(delay) = main_account_id.and_then(|id| exhausted.get(&id).copied()) {
            debug!("Main account exhausted in this batch, deferring");
            let details = FailureDetails::error("main account rate limit exhausted");
            return self.reschedule(task, delay, details, "exhausted").await;
        }

        let started = Instant::now();
        let result = self.dispatcher.dispatch(task, accounts, settings).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let err = match result {
            Ok(outcome) => {
                if let HandlerOutcome::Skipped { reason } = &outcome {
                    debug!("Skipped: {}", reason);
                }
                return self.complete(task, main_account_id, duration_ms).await;
            }
            Err(err) => err,
        };

        if let Some(signal) = err.rate_limit_signal() {
            return self
                .handle_rate_limit(task, main_account_id, signal, exhausted, report)
                .await;
        }
        self.handle_failure(task, accounts, main_account_id, err, duration_ms)
            .await
    }

    async fn complete(
        &self,
        task: &SyncTask,
        main_account_id: Option<i64>,
        duration_ms: u64,
    ) -> Result<TaskOutcome, WorkerError> {
        if !self.queue.complete(task.id).await? {
            warn!("Task {} was no longer processing, completion ignored", task.id);
            return Ok(TaskOutcome::Lost);
        }
        counter!("sync_tasks_completed_total").increment(1);
        self.record_stats(task, main_account_id, true, duration_ms).await;
        Ok(TaskOutcome::Completed)
    }

    /// 限流不消耗尝试次数
    async fn handle_rate_limit(
        &self,
        task: &SyncTask,
        main_account_id: Option<i64>,
        signal: &RateLimitSignal,
        exhausted: &mut HashMap<i64, Duration>,
        report: &mut BatchReport,
    ) -> Result<TaskOutcome, WorkerError> {
        let scope = signal.scope(self.config.global_exhaustion_threshold);
        counter!("sync_rate_limit_hits_total", "scope" => scope.to_string()).increment(1);

        let details =
            FailureDetails::error(signal.to_string()).with_rate_limit_info(signal.to_info());
        let outcome = self
            .reschedule(task, signal.retry_after, details, "rate_limited")
            .await?;

        match (scope, main_account_id) {
            (RateLimitScope::Global, Some(main_account_id)) => {
                warn!(
                    "Main account {} quota exhausted, postponing its tasks for {:?}",
                    main_account_id, signal.retry_after
                );
                exhausted.insert(main_account_id, signal.retry_after);
                let postponed = self
                    .queue
                    .postpone_all_for_main_account(main_account_id, signal.retry_after, Some(task.id))
                    .await?;
                report.postponed += postponed;
            }
            _ => debug!("Endpoint rate limited: {}", signal),
        }

        Ok(outcome)
    }

    async fn handle_failure(
        &self,
        task: &SyncTask,
        accounts: &AccountCache,
        main_account_id: Option<i64>,
        err: SyncError,
        duration_ms: u64,
    ) -> Result<TaskOutcome, WorkerError> {
        let attempts = task.attempts + 1;
        let message = err.to_string();

        if let SyncError::UnknownEntityType(entity_type) = &err {
            error!(
                "ALARM: no handler registered for entity type '{}', task {} failed",
                entity_type, task.id
            );
            return self
                .fail(task, main_account_id, &message, attempts, "unknown_entity_type", duration_ms)
                .await;
        }

        if task.is_batch() {
            // 没有账号就无法核对映射，拆出的任务也会以同样原因失败
            let Some(account) = accounts.get(&task.account_id) else {
                error!(
                    "ALARM: account {} for batch task {} is not available, failing without decomposition",
                    task.account_id, task.id
                );
                return self
                    .fail(task, main_account_id, &message, attempts, "missing_account", duration_ms)
                    .await;
            };

            return match self
                .decomposer
                .decompose(task, account, &message, attempts, duration_ms)
                .await?
            {
                Some(result) => {
                    debug!("Batch decomposed into {} tasks", result.created.len());
                    Ok(TaskOutcome::Decomposed)
                }
                None => Ok(TaskOutcome::Lost),
            };
        }

        let class = classify_error(&err);
        if self.retry_policy.should_retry(class, attempts, task.max_attempts) {
            let delay = self.retry_policy.backoff(attempts);
            info!(
                "Retryable failure (attempt {}/{}), retrying in {:?}: {}",
                attempts, task.max_attempts, delay, message
            );
            let details = FailureDetails::error(message).with_attempts(attempts);
            return self.reschedule(task, delay, details, "retry").await;
        }

        let reason = match class {
            ErrorClass::Permanent => "permanent",
            ErrorClass::Retryable => "attempts_exhausted",
        };
        warn!("Task failed ({}): {}", reason, message);
        self.fail(task, main_account_id, &message, attempts, reason, duration_ms)
            .await
    }

    async fn reschedule(
        &self,
        task: &SyncTask,
        delay: Duration,
        details: FailureDetails,
        reason: &'static str,
    ) -> Result<TaskOutcome, WorkerError> {
        match self.queue.reschedule(task.id, delay, details).await {
            Ok(()) => {
                counter!("sync_tasks_rescheduled_total", "reason" => reason).increment(1);
                Ok(TaskOutcome::Rescheduled)
            }
            Err(QueueError::Repository(RepositoryError::NotFound)) => {
                warn!("Task {} was no longer processing, reschedule ignored", task.id);
                Ok(TaskOutcome::Lost)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fail(
        &self,
        task: &SyncTask,
        main_account_id: Option<i64>,
        message: &str,
        attempts: i32,
        reason: &'static str,
        duration_ms: u64,
    ) -> Result<TaskOutcome, WorkerError> {
        let details = FailureDetails::error(message).with_attempts(attempts);
        if !self.queue.fail(task.id, details).await? {
            warn!("Task {} was no longer processing, failure ignored", task.id);
            return Ok(TaskOutcome::Lost);
        }
        counter!("sync_tasks_failed_total", "reason" => reason).increment(1);
        self.record_stats(task, main_account_id, false, duration_ms).await;
        Ok(TaskOutcome::Failed)
    }

    /// 统计写入失败不影响任务状态
    async fn record_stats(
        &self,
        task: &SyncTask,
        main_account_id: Option<i64>,
        success: bool,
        duration_ms: u64,
    ) {
        if let Err(e) = self
            .stats
            .record_sync(
                main_account_id,
                task.account_id,
                task.entity_type.category(),
                success,
                duration_ms,
            )
            .await
        {
            warn!("Failed to record sync statistics for task {}: {}", task.id, e);
        }
    }
}

#[async_trait]
impl Worker for SyncWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        self.run_cycle().await.map(|_| ())
    }

    fn name(&self) -> &str {
        "sync"
    }

    fn interval(&self) -> Duration {
        self.config.interval
    }
}
