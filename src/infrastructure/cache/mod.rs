// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 限流快照的进程内与 Redis 实现
pub mod rate_limit_tracker;
