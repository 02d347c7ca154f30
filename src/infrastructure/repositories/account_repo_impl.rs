// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::account::{Account, AccountSettings};
use crate::domain::repositories::account_repository::AccountRepository;
use crate::domain::repositories::sync_task_repository::RepositoryError;
use crate::infrastructure::database::entities::{account, account_settings};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

/// 账号仓库实现
#[derive(Clone)]
pub struct AccountRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl AccountRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<account::Model> for Account {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_account_id: model.parent_account_id,
            api_token: model.api_token,
            is_active: model.is_active,
        }
    }
}

impl From<account_settings::Model> for AccountSettings {
    fn from(model: account_settings::Model) -> Self {
        Self {
            account_id: model.account_id,
            sync_products: model.sync_products,
            sync_orders: model.sync_orders,
            sync_images: model.sync_images,
            options: model.options,
        }
    }
}

#[async_trait]
impl AccountRepository for AccountRepositoryImpl {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError> {
        let model = account::Entity::find_by_id(id).one(self.db.as_ref()).await?;
        Ok(model.map(Account::from))
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Account>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = account::Entity::find()
            .filter(account::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Account::from).collect())
    }

    async fn find_settings(
        &self,
        account_ids: &[i64],
    ) -> Result<Vec<AccountSettings>, RepositoryError> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = account_settings::Entity::find()
            .filter(account_settings::Column::AccountId.is_in(account_ids.to_vec()))
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(AccountSettings::from).collect())
    }

    async fn find_active(&self) -> Result<Vec<Account>, RepositoryError> {
        let models = account::Entity::find()
            .filter(account::Column::IsActive.eq(true))
            .order_by_asc(account::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Account::from).collect())
    }
}
