// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use migration::{Migrator, MigratorTrait};
use syncrs::config::settings::{RateLimitBackend, Settings};
use syncrs::domain::models::sync_task::EntityType;
use syncrs::domain::models::webhook_health::HealthPolicy;
use syncrs::domain::services::batch_decomposer::BatchFailureDecomposer;
use syncrs::domain::services::health_notifier::LogHealthNotifier;
use syncrs::domain::services::rate_limit_tracker::RateLimitTracker;
use syncrs::domain::services::remote_api::RemoteApiClient;
use syncrs::domain::services::webhook_health_service::{WebhookHealthConfig, WebhookHealthMonitor};
use syncrs::infrastructure::cache::rate_limit_tracker::{
    InMemoryRateLimitTracker, RedisRateLimitTracker,
};
use syncrs::infrastructure::database::connection;
use syncrs::infrastructure::remote::http_client::HttpRemoteClient;
use syncrs::infrastructure::repositories::account_repo_impl::AccountRepositoryImpl;
use syncrs::infrastructure::repositories::entity_mapping_repo_impl::EntityMappingRepositoryImpl;
use syncrs::infrastructure::repositories::sync_statistics_repo_impl::SyncStatisticsRepositoryImpl;
use syncrs::infrastructure::repositories::sync_task_repo_impl::SyncTaskRepositoryImpl;
use syncrs::infrastructure::repositories::webhook_health_repo_impl::WebhookHealthRepositoryImpl;
use syncrs::presentation::routes::{self, AppState};
use syncrs::queue::task_queue::{PostgresSyncQueue, SyncQueue};
use syncrs::sync::batch_handler::BatchEntityHandler;
use syncrs::sync::dispatcher::TaskDispatcher;
use syncrs::sync::entity_handler::RemoteEntityHandler;
use syncrs::sync::transform::PassthroughTransformer;
use syncrs::sync::webhook_handler::WebhookVerifyHandler;
use syncrs::utils::retry_policy::RetryPolicy;
use syncrs::utils::telemetry;
use syncrs::workers::manager::WorkerManager;
use syncrs::workers::sync_worker::{SyncWorker, SyncWorkerConfig};
use syncrs::workers::webhook_health_worker::WebhookHealthWorker;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.telemetry.json);
    info!("Starting syncrs...");
    syncrs::infrastructure::metrics::init_metrics(&settings.metrics.listen_addr);

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Repositories
    let task_repo = Arc::new(SyncTaskRepositoryImpl::new(db.clone()));
    let account_repo = Arc::new(AccountRepositoryImpl::new(db.clone()));
    let mapping_repo = Arc::new(EntityMappingRepositoryImpl::new(db.clone()));
    let health_repo = Arc::new(WebhookHealthRepositoryImpl::new(db.clone()));
    let stats = Arc::new(SyncStatisticsRepositoryImpl::new(db.clone()));

    // 5. Rate limit tracker and remote client
    let tracker: Arc<dyn RateLimitTracker> = match settings.rate_limit.backend {
        RateLimitBackend::Memory => {
            Arc::new(InMemoryRateLimitTracker::new(settings.rate_limit.ttl()))
        }
        RateLimitBackend::Redis => {
            let url = settings
                .redis
                .url
                .as_deref()
                .context("redis.url is required for the redis rate limit backend")?;
            Arc::new(RedisRateLimitTracker::new(url, settings.rate_limit.ttl())?)
        }
    };
    info!("Rate limit tracker initialized ({:?})", settings.rate_limit.backend);

    let remote: Arc<dyn RemoteApiClient> = Arc::new(HttpRemoteClient::new(
        &settings.remote_api.base_url,
        Duration::from_secs(settings.remote_api.timeout_secs),
        tracker,
        settings.rate_limit.default_retry_after(),
    )?);

    // 6. Webhook health monitor
    let monitor = Arc::new(WebhookHealthMonitor::new(
        account_repo.clone(),
        health_repo,
        remote.clone(),
        Arc::new(LogHealthNotifier),
        WebhookHealthConfig {
            policy: HealthPolicy {
                critical_attempts: settings.webhook_health.critical_attempts,
                stale_after: chrono::Duration::hours(settings.webhook_health.stale_after_hours),
            },
            callback_url: settings.webhook_health.callback_url.clone(),
        },
    ));

    // 7. Handler registry
    let transformer = Arc::new(PassthroughTransformer);
    let mut dispatcher = TaskDispatcher::new();
    for entity_type in [
        EntityType::Product,
        EntityType::Variant,
        EntityType::Bundle,
        EntityType::Order,
        EntityType::Image,
    ] {
        dispatcher.register(Arc::new(RemoteEntityHandler::new(
            entity_type,
            mapping_repo.clone(),
            remote.clone(),
            transformer.clone(),
        )));
    }
    for entity_type in [EntityType::ProductBatch, EntityType::VariantBatch] {
        dispatcher.register(Arc::new(BatchEntityHandler::new(
            entity_type,
            mapping_repo.clone(),
            remote.clone(),
        )));
    }
    dispatcher.register(Arc::new(WebhookVerifyHandler::new(monitor.clone())));
    info!("Registered handlers: {:?}", dispatcher.registered_types());

    // 8. Queue and workers
    let queue: Arc<dyn SyncQueue> = Arc::new(PostgresSyncQueue::new(
        task_repo.clone(),
        settings.scheduler.stuck_task_timeout(),
    ));

    let decomposer = Arc::new(BatchFailureDecomposer::new(
        task_repo,
        mapping_repo,
        remote,
        stats.clone(),
        settings.scheduler.decomposition_delay(),
    ));

    let sync_worker = SyncWorker::new(
        queue.clone(),
        Arc::new(dispatcher),
        account_repo,
        decomposer,
        stats,
        RetryPolicy::new(settings.scheduler.retry_backoff()),
        SyncWorkerConfig {
            interval: settings.scheduler.interval(),
            batch_size: settings.scheduler.batch_size,
            batch_timeout: settings.scheduler.batch_timeout(),
            global_exhaustion_threshold: settings.rate_limit.global_exhaustion_threshold,
        },
    );
    let health_worker = WebhookHealthWorker::new(
        monitor.clone(),
        Duration::from_secs(settings.webhook_health.interval_secs),
        settings.webhook_health.auto_heal,
    );

    let shutdown_grace = settings.scheduler.batch_timeout();
    let mut manager = WorkerManager::new();
    manager.spawn(Arc::new(sync_worker));
    manager.spawn(Arc::new(health_worker));
    info!("Started {} workers", manager.len());

    // 9. Admin API
    let app = routes::app(AppState {
        queue,
        monitor,
        default_max_attempts: settings.scheduler.default_max_attempts,
        auto_heal: settings.webhook_health.auto_heal,
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            manager.wait_for_shutdown(shutdown_grace).await;
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
