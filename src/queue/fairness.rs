// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::sync_task::{main_account_id_from_payload, SyncTask};
use std::collections::VecDeque;

/// 按主账号轮询重排一批任务
///
/// 分组顺序按各主账号在批次中首次出现的位置，组内保持原有顺序。
/// 每轮从每组取一个，直到所有组取空。只有一组时原样返回。
pub fn balance_by_main_account(tasks: Vec<SyncTask>) -> Vec<SyncTask> {
    let mut groups: Vec<(Option<i64>, VecDeque<SyncTask>)> = Vec::new();

    for task in tasks {
        let key = fairness_key(&task);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push_back(task),
            None => groups.push((key, VecDeque::from([task]))),
        }
    }

    if groups.len() <= 1 {
        return groups.into_iter().flat_map(|(_, g)| g).collect();
    }

    let total = groups.iter().map(|(_, g)| g.len()).sum();
    let mut balanced = Vec::with_capacity(total);
    while balanced.len() < total {
        for (_, group) in groups.iter_mut() {
            if let Some(task) = group.pop_front() {
                balanced.push(task);
            }
        }
    }
    balanced
}

/// 公平分组键：主账号ID，缺失时归入同一组
pub fn fairness_key(task: &SyncTask) -> Option<i64> {
    task.main_account_id
        .or_else(|| main_account_id_from_payload(&task.payload))
}
