// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::sync_task::EntityType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// 账号
///
/// 没有 `parent_account_id` 的是主账号，其余是挂在某个主账号下的子账号。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub parent_account_id: Option<i64>,
    /// 调用远程 API 使用的令牌
    #[serde(skip_serializing)]
    pub api_token: String,
    pub is_active: bool,
}

impl Account {
    pub fn is_main(&self) -> bool {
        self.parent_account_id.is_none()
    }
}

/// 子账号同步设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub account_id: i64,
    pub sync_products: bool,
    pub sync_orders: bool,
    pub sync_images: bool,
    /// 交给数据转换层使用的其它选项
    pub options: Value,
}

impl AccountSettings {
    /// 该子账号是否接收此类实体的同步
    pub fn allows(&self, entity_type: &EntityType) -> bool {
        match entity_type.category() {
            "catalog" => self.sync_products,
            "orders" => self.sync_orders,
            "images" => self.sync_images,
            _ => true,
        }
    }
}

/// 批次内预加载的账号缓存
pub type AccountCache = HashMap<i64, Account>;

/// 批次内预加载的子账号设置缓存
pub type SettingsCache = HashMap<i64, AccountSettings>;
