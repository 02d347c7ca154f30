// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// 同步任务实体
///
/// 队列中的一个工作单元：在某个子账号的上下文中，对一个实体执行一次同步操作。
/// `payload` 中总是带有 `main_account_id`，用于公平调度和定位上游限流快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    /// 任务ID
    pub id: i64,
    /// 执行任务的子账号ID，所有远程变更都在该账号上下文中发生
    pub account_id: i64,
    /// 驱动该任务的主账号ID（从 payload 冗余出来，便于排序和批量推迟）
    pub main_account_id: Option<i64>,
    /// 实体类型，决定由哪个处理器执行
    pub entity_type: EntityType,
    /// 实体ID（主账号侧的ID）
    pub entity_id: String,
    /// 同步操作
    pub operation: SyncOperation,
    /// 优先级，数值越大越先被调度
    pub priority: i32,
    /// 公平序号，入队时该主账号已有的待处理任务数
    pub fairness_seq: i32,
    /// 任务状态
    pub status: TaskStatus,
    /// 已消耗的尝试次数
    pub attempts: i32,
    /// 最大尝试次数
    pub max_attempts: i32,
    /// 任务负载
    pub payload: Value,
    /// 最近一次失败原因
    pub error: Option<String>,
    /// 最近一次限流信息
    pub rate_limit_info: Option<Value>,
    /// 计划执行时间，早于该时间不会被领取
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    /// 被领取的时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成或失败的时间
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl SyncTask {
    /// 判断该任务是否为批量任务（一个任务代表多个实体的一次远程调用）
    pub fn is_batch(&self) -> bool {
        self.entity_type.is_batch()
    }

    /// Webhook 来源的部分更新字段提示
    pub fn updated_fields(&self) -> Option<Vec<String>> {
        let fields = self.payload.get("updated_fields")?.as_array()?;
        Some(
            fields
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// 批量任务中内嵌的实体列表
    pub fn embedded_entities(&self) -> Option<&Vec<Value>> {
        self.payload.get("entities")?.as_array()
    }
}

/// 从 payload 中读取 `main_account_id`，兼容数字和字符串两种写法
pub fn main_account_id_from_payload(payload: &Value) -> Option<i64> {
    match payload.get("main_account_id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// 批量负载中单个实体的数据部分，形如 `{id, data}`；没有 `data` 时取整个对象
pub fn entity_data(entity: &Value) -> Value {
    entity.get("data").cloned().unwrap_or_else(|| entity.clone())
}

/// 入队请求
#[derive(Debug, Clone)]
pub struct NewSyncTask {
    pub account_id: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub operation: SyncOperation,
    pub priority: i32,
    pub payload: Value,
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    pub max_attempts: i32,
}

impl NewSyncTask {
    /// 创建入队请求，默认优先级 0、立即可执行、最多尝试 3 次
    pub fn new(
        account_id: i64,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        operation: SyncOperation,
        payload: Value,
    ) -> Self {
        Self {
            account_id,
            entity_type,
            entity_id: entity_id.into(),
            operation,
            priority: 0,
            payload,
            scheduled_at: None,
            max_attempts: 3,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<FixedOffset>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn main_account_id(&self) -> Option<i64> {
        main_account_id_from_payload(&self.payload)
    }
}

/// 实体类型
///
/// 批量类型（`ProductBatch`、`VariantBatch`）代表一次远程调用中创建/更新的多个实体。
/// 无法识别的类型保留原始字符串，由分发器报告为配置错误。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EntityType {
    Product,
    Variant,
    Bundle,
    Order,
    Image,
    Webhook,
    ProductBatch,
    VariantBatch,
    Other(String),
}

impl EntityType {
    /// 是否为批量类型
    pub fn is_batch(&self) -> bool {
        matches!(self, EntityType::ProductBatch | EntityType::VariantBatch)
    }

    /// 批量类型对应的单个实体类型；非批量类型返回自身
    pub fn item_type(&self) -> EntityType {
        match self {
            EntityType::ProductBatch => EntityType::Product,
            EntityType::VariantBatch => EntityType::Variant,
            other => other.clone(),
        }
    }

    /// 远程 API 中的资源路径段
    pub fn resource(&self) -> &str {
        match self {
            EntityType::Product | EntityType::ProductBatch => "products",
            EntityType::Variant | EntityType::VariantBatch => "variants",
            EntityType::Bundle => "bundles",
            EntityType::Order => "orders",
            EntityType::Image => "images",
            EntityType::Webhook => "webhooks",
            EntityType::Other(name) => name.as_str(),
        }
    }

    /// 统计分类，同时决定子账号设置中哪个开关控制该类型
    pub fn category(&self) -> &'static str {
        match self {
            EntityType::Product
            | EntityType::Variant
            | EntityType::Bundle
            | EntityType::ProductBatch
            | EntityType::VariantBatch => "catalog",
            EntityType::Order => "orders",
            EntityType::Image => "images",
            EntityType::Webhook => "webhooks",
            EntityType::Other(_) => "other",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntityType::Product => write!(f, "product"),
            EntityType::Variant => write!(f, "variant"),
            EntityType::Bundle => write!(f, "bundle"),
            EntityType::Order => write!(f, "order"),
            EntityType::Image => write!(f, "image"),
            EntityType::Webhook => write!(f, "webhook"),
            EntityType::ProductBatch => write!(f, "product_batch"),
            EntityType::VariantBatch => write!(f, "variant_batch"),
            EntityType::Other(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for EntityType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "product" => EntityType::Product,
            "variant" => EntityType::Variant,
            "bundle" => EntityType::Bundle,
            "order" => EntityType::Order,
            "image" => EntityType::Image,
            "webhook" => EntityType::Webhook,
            "product_batch" => EntityType::ProductBatch,
            "variant_batch" => EntityType::VariantBatch,
            other => EntityType::Other(other.to_string()),
        })
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(entity_type) => entity_type,
            Err(never) => match never {},
        }
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.to_string()
    }
}

/// 同步操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    #[default]
    Create,
    Update,
    Archive,
    /// 存在映射则更新，否则创建
    Sync,
    BatchCreate,
    BatchUpdate,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyncOperation::Create => write!(f, "create"),
            SyncOperation::Update => write!(f, "update"),
            SyncOperation::Archive => write!(f, "archive"),
            SyncOperation::Sync => write!(f, "sync"),
            SyncOperation::BatchCreate => write!(f, "batch_create"),
            SyncOperation::BatchUpdate => write!(f, "batch_update"),
        }
    }
}

impl FromStr for SyncOperation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(SyncOperation::Create),
            "update" => Ok(SyncOperation::Update),
            "archive" => Ok(SyncOperation::Archive),
            "sync" => Ok(SyncOperation::Sync),
            "batch_create" => Ok(SyncOperation::BatchCreate),
            "batch_update" => Ok(SyncOperation::BatchUpdate),
            _ => Err(()),
        }
    }
}

/// 任务状态
///
/// Pending → Processing → Completed/Failed，限流或可重试失败时 Processing → Pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}
