// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::traits::{EntitySyncHandler, HandlerOutcome, SyncContext, SyncError};
use crate::domain::models::account::{AccountCache, SettingsCache};
use crate::domain::models::sync_task::{main_account_id_from_payload, EntityType, SyncTask};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 任务分发器
///
/// 实体类型到处理器的注册表。新增实体类型只需注册新的处理器。
#[derive(Default, Clone)]
pub struct TaskDispatcher {
    handlers: HashMap<EntityType, Arc<dyn EntitySyncHandler>>,
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，同一实体类型后注册的覆盖先注册的
    pub fn register(&mut self, handler: Arc<dyn EntitySyncHandler>) -> &mut Self {
        let entity_type = handler.entity_type();
        debug!("Registering sync handler for {}", entity_type);
        self.handlers.insert(entity_type, handler);
        self
    }

    pub fn registered_types(&self) -> Vec<EntityType> {
        self.handlers.keys().cloned().collect()
    }

    /// 分发任务
    ///
    /// # 参数
    ///
    /// * `task` - 已领取的任务
    /// * `accounts` - 批次预加载的账号缓存
    /// * `settings` - 批次预加载的子账号设置缓存
    ///
    /// # 返回值
    ///
    /// * `Ok(HandlerOutcome)` - 处理器的执行结果
    /// * `Err(SyncError::UnknownEntityType)` - 没有注册对应处理器
    /// * `Err(SyncError)` - 处理器返回的其它错误
    pub async fn dispatch(
        &self,
        task: &SyncTask,
        accounts: &AccountCache,
        settings: &SettingsCache,
    ) -> Result<HandlerOutcome, SyncError> {
        let handler = self
            .handlers
            .get(&task.entity_type)
            .ok_or_else(|| SyncError::UnknownEntityType(task.entity_type.to_string()))?;

        let account = accounts
            .get(&task.account_id)
            .ok_or(SyncError::MissingAccount(task.account_id))?;

        let main_account_id = task
            .main_account_id
            .or_else(|| main_account_id_from_payload(&task.payload));

        let ctx = SyncContext {
            account,
            main_account: main_account_id.and_then(|id| accounts.get(&id)),
            settings: settings.get(&task.account_id),
        };

        handler.handle(task, ctx).await
    }
}
