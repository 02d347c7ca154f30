// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 同步任务队列以及批次内的公平调度
pub mod fairness;
pub mod task_queue;
