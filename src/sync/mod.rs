// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 同步处理模块
///
/// 按实体类型注册的处理器，以及把已领取任务路由到处理器的分发器
pub mod batch_handler;
pub mod dispatcher;
pub mod entity_handler;
pub mod traits;
pub mod transform;
pub mod webhook_handler;
