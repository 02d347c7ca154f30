// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use std::time::Duration;

/// 当前时间（带固定时区），所有落库时间统一用这个类型
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

/// 将标准库时长换算为 chrono 时长，溢出时取最大值
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// 从现在起经过 `delay` 后的时间点
pub fn after(delay: Duration) -> DateTime<FixedOffset> {
    now() + to_chrono(delay)
}
