// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// 工作管理器
///
/// 每个工作器一个后台任务，按各自的间隔循环执行。
/// 同一工作器的两轮不会重叠：上一轮未结束时错过的触发直接跳过。
/// 关闭时不打断正在执行的一轮，等它把已领取的任务落库后再退出。
pub struct WorkerManager {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Default for WorkerManager {
    fn default() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            handles: Vec::new(),
            shutdown_tx,
        }
    }
}

impl WorkerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动一个工作器
    ///
    /// # 参数
    ///
    /// * `worker` - 要周期执行的工作器
    pub fn spawn(&mut self, worker: Arc<dyn Worker>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            info!("Worker {} started, interval {:?}", worker.name(), worker.interval());
            let mut ticker = tokio::time::interval(worker.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                if *shutdown_rx.borrow() {
                    break;
                }
                if let Err(e) = worker.run().await {
                    error!("Worker {} cycle failed: {}", worker.name(), e);
                }
            }
            info!("Worker {} stopped", worker.name());
        });
        self.handles.push(handle);
    }

    /// 已启动的工作器数量
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 停止所有工作器
    ///
    /// 通知各工作器在当前一轮结束后退出；超过 `grace` 仍未退出的才强制中止
    pub async fn shutdown(&mut self, grace: Duration) {
        info!("Shutting down workers...");
        // 所有接收端都已退出时发送失败，无需处理
        let _ = self.shutdown_tx.send(true);

        for mut handle in self.handles.drain(..) {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("Worker did not stop within {:?}, aborting", grace);
                handle.abort();
            }
        }
        info!("Workers shut down successfully");
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self, grace: Duration) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown(grace).await;
    }
}
