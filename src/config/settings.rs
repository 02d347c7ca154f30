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

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、Redis、服务器、调度器、限流、远程 API 和 Webhook 健康检查等配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    #[serde(default)]
    pub redis: RedisSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 限流配置
    pub rate_limit: RateLimitSettings,
    /// 远程 API 配置
    pub remote_api: RemoteApiSettings,
    /// Webhook 健康检查配置
    pub webhook_health: WebhookHealthSettings,
    /// 日志配置
    pub telemetry: TelemetrySettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// Redis配置设置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL，仅 redis 限流后端使用
    pub url: Option<String>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 轮询间隔（秒）
    pub interval_secs: u64,
    /// 每批最多领取的任务数
    pub batch_size: u64,
    /// 单批处理的总超时（秒）
    pub batch_timeout_secs: u64,
    /// processing 超过多少分钟视为卡住
    pub stuck_task_timeout_minutes: u64,
    /// 线性退避步长（分钟）
    pub retry_backoff_minutes: u64,
    /// 入队默认最大尝试次数
    pub default_max_attempts: i32,
    /// 批量分解后新任务的延迟（秒）
    pub decomposition_delay_secs: u64,
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn stuck_task_timeout(&self) -> Duration {
        Duration::from_secs(self.stuck_task_timeout_minutes * 60)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_minutes * 60)
    }

    pub fn decomposition_delay(&self) -> Duration {
        Duration::from_secs(self.decomposition_delay_secs)
    }
}

/// 限流跟踪后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    Memory,
    Redis,
}

/// 限流配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// 快照缓存后端
    pub backend: RateLimitBackend,
    /// 快照有效期（秒）
    pub ttl_secs: u64,
    /// 剩余配额不超过该值视为主账号全局耗尽
    pub global_exhaustion_threshold: i64,
    /// 429 响应未带 Retry-After 时的默认等待（秒）
    pub default_retry_after_secs: u64,
}

impl RateLimitSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

/// 远程 API 配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteApiSettings {
    /// API 根地址
    pub base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

/// Webhook 健康检查配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookHealthSettings {
    /// 检查间隔（秒）
    pub interval_secs: u64,
    /// 账号 critical 时是否自动重新安装订阅
    pub auto_heal: bool,
    /// 连续失败多少次视为 critical
    pub critical_attempts: i32,
    /// 多少小时没有成功检查视为 warning
    pub stale_after_hours: i64,
    /// 重新安装订阅时注册的回调地址
    pub callback_url: String,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// 是否输出 JSON 格式日志
    pub json: bool,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Prometheus 监听地址
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和 `SYNCRS__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SYNCRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 仅含默认值的构建器
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB pool settings
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Scheduler
            .set_default("scheduler.interval_secs", 60)?
            .set_default("scheduler.batch_size", 50)?
            .set_default("scheduler.batch_timeout_secs", 240)?
            .set_default("scheduler.stuck_task_timeout_minutes", 15)?
            .set_default("scheduler.retry_backoff_minutes", 5)?
            .set_default("scheduler.default_max_attempts", 3)?
            .set_default("scheduler.decomposition_delay_secs", 60)?
            // Rate limit tracking
            .set_default("rate_limit.backend", "memory")?
            .set_default("rate_limit.ttl_secs", 120)?
            .set_default("rate_limit.global_exhaustion_threshold", 1)?
            .set_default("rate_limit.default_retry_after_secs", 60)?
            // Remote API
            .set_default("remote_api.base_url", "http://localhost:8080/api/v1")?
            .set_default("remote_api.timeout_secs", 30)?
            // Webhook health
            .set_default("webhook_health.interval_secs", 3600)?
            .set_default("webhook_health.auto_heal", true)?
            .set_default("webhook_health.critical_attempts", 3)?
            .set_default("webhook_health.stale_after_hours", 24)?
            .set_default("webhook_health.callback_url", "http://localhost:3000/webhooks")?
            .set_default("telemetry.json", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
