// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 管理接口的数据传输对象
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、限流缓存、远程 API 和指标
pub mod infrastructure;

/// 表示层模块
///
/// 管理接口的路由和处理器
pub mod presentation;

/// 队列模块
///
/// 同步任务队列和公平调度
pub mod queue;

/// 同步模块
///
/// 实体同步处理器及其分发注册表
pub mod sync;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现后台任务处理和工作器管理
pub mod workers;
