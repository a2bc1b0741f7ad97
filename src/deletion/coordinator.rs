//! 延迟删除协调器
//!
//! 删除请求先进入有界队列，由后台 worker 累积，每个刷新周期把累积的批次
//! 交给独立任务应用到仓库：
//! - 队列满时 `submit` 等待（背压，不丢弃）
//! - 应用失败只记录日志，不重试
//! - 关闭时在限定时间内等待进行中的任务，剩余批次写入回退日志

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info, trace, warn};

use super::fallback::FallbackLog;
use crate::config::DeletionConfig;
use crate::errors::{Result, ShortenerError};
use crate::storage::{DeleteRequestBatch, UrlRepository};

/// 关闭结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// 写入回退日志的批次数
    pub persisted_batches: usize,
    /// 写回退日志失败而丢失的批次数
    pub lost_batches: usize,
    /// 在等待期限内完成的应用任务数
    pub drained_applies: usize,
    /// 超过等待期限被中止的应用任务数，其批次已转入回退日志
    pub aborted_applies: usize,
}

/// 删除协调器句柄
pub struct DeletionCoordinator {
    intake: mpsc::Sender<DeleteRequestBatch>,
    shutdown: mpsc::Sender<oneshot::Sender<ShutdownReport>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeletionCoordinator {
    /// 启动后台 worker，需要在 tokio 运行时中调用
    pub fn start(repository: Arc<dyn UrlRepository>, config: &DeletionConfig) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = DeletionWorker {
            repository,
            intake: intake_rx,
            shutdown: shutdown_rx,
            pending: Vec::new(),
            in_flight: JoinSet::new(),
            in_flight_batches: HashMap::new(),
            flush_interval: config.flush_interval(),
            drain_timeout: config.drain_timeout(),
            fallback: FallbackLog::new(&config.fallback_log_path),
        };

        info!(
            "Deletion coordinator started (flush every {:?}, queue capacity {})",
            worker.flush_interval,
            config.queue_capacity.max(1)
        );

        Self {
            intake: intake_tx,
            shutdown: shutdown_tx,
            worker: Mutex::new(Some(tokio::spawn(worker.run()))),
        }
    }

    /// 提交删除请求，队列满时等待
    pub async fn submit(&self, batch: DeleteRequestBatch) -> Result<()> {
        if batch.short_keys.is_empty() {
            return Ok(());
        }

        self.intake.send(batch).await.map_err(|_| {
            ShortenerError::coordinator_stopped("deletion coordinator no longer accepts requests")
        })
    }

    /// 请求关闭并等待完成
    ///
    /// 未应用的批次写入回退日志后返回；回退日志写入失败只记录日志，
    /// 不会让关闭失败。
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        let (done_tx, done_rx) = oneshot::channel();
        self.shutdown
            .send(done_tx)
            .await
            .map_err(|_| ShortenerError::coordinator_stopped("deletion coordinator already stopped"))?;

        let report = done_rx.await.map_err(|_| {
            ShortenerError::coordinator_stopped("deletion coordinator exited during shutdown")
        })?;

        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!("Deletion worker ended abnormally: {}", e);
        }

        Ok(report)
    }
}

struct DeletionWorker {
    repository: Arc<dyn UrlRepository>,
    intake: mpsc::Receiver<DeleteRequestBatch>,
    shutdown: mpsc::Receiver<oneshot::Sender<ShutdownReport>>,
    /// 尚未交给应用任务的批次
    pending: Vec<DeleteRequestBatch>,
    in_flight: JoinSet<()>,
    /// 进行中任务的批次副本，任务被中止时转入回退日志
    in_flight_batches: HashMap<task::Id, Vec<DeleteRequestBatch>>,
    flush_interval: Duration,
    drain_timeout: Duration,
    fallback: FallbackLog,
}

impl DeletionWorker {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(done) = self.shutdown.recv() => {
                    let report = self.stop().await;
                    if done.send(report).is_err() {
                        debug!("Shutdown requester went away before completion");
                    }
                    return;
                }
                received = self.intake.recv() => match received {
                    Some(batch) => {
                        trace!("Queued delete batch for user {}", batch.user_id);
                        self.pending.push(batch);
                    }
                    None => {
                        // 句柄被直接丢弃：按关闭流程处理剩余工作
                        warn!("Deletion coordinator dropped without shutdown");
                        self.stop().await;
                        return;
                    }
                },
                _ = ticker.tick() => self.flush(),
                Some(joined) = self.in_flight.join_next_with_id(), if !self.in_flight.is_empty() => {
                    self.reap(joined);
                }
            }
        }
    }

    /// 交出当前累积的批次，立即开始新的累积
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batches = mem::take(&mut self.pending);
        let repository = Arc::clone(&self.repository);
        let to_apply = batches.clone();
        let handle = self.in_flight.spawn(apply(repository, to_apply));
        debug!(
            "Flushing {} delete batches ({} applies in flight)",
            batches.len(),
            self.in_flight.len()
        );
        self.in_flight_batches.insert(handle.id(), batches);
    }

    /// 回收已结束的应用任务，返回被取消任务的批次
    fn reap(
        &mut self,
        joined: std::result::Result<(task::Id, ()), JoinError>,
    ) -> Option<Vec<DeleteRequestBatch>> {
        match joined {
            Ok((id, ())) => {
                self.in_flight_batches.remove(&id);
                None
            }
            Err(e) => {
                let batches = self.in_flight_batches.remove(&e.id());
                if e.is_cancelled() {
                    batches
                } else {
                    error!(
                        "Delete apply task panicked, {} batches dropped: {}",
                        batches.map_or(0, |b| b.len()),
                        e
                    );
                    None
                }
            }
        }
    }

    async fn stop(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        // 已进入队列的请求不能丢
        self.intake.close();
        while let Ok(batch) = self.intake.try_recv() {
            self.pending.push(batch);
        }

        let deadline = sleep(self.drain_timeout);
        tokio::pin!(deadline);
        while !self.in_flight.is_empty() {
            tokio::select! {
                Some(joined) = self.in_flight.join_next_with_id() => {
                    self.reap(joined);
                    report.drained_applies += 1;
                }
                _ = &mut deadline => break,
            }
        }

        if !self.in_flight.is_empty() {
            self.in_flight.abort_all();
            let mut recovered = Vec::new();
            while let Some(joined) = self.in_flight.join_next_with_id().await {
                match self.reap(joined) {
                    Some(batches) => {
                        report.aborted_applies += 1;
                        recovered.extend(batches);
                    }
                    None => report.drained_applies += 1,
                }
            }
            // 进行中的批次早于尚未刷新的批次
            recovered.append(&mut self.pending);
            self.pending = recovered;
        }

        if self.pending.is_empty() {
            info!("Deletion coordinator stopped, nothing pending");
            return report;
        }

        let batches = mem::take(&mut self.pending);
        match self.fallback.append(&batches) {
            Ok(()) => {
                report.persisted_batches = batches.len();
                warn!(
                    "Deletion coordinator stopped, {} pending batches written to {}",
                    batches.len(),
                    self.fallback.path().display()
                );
            }
            Err(e) => {
                report.lost_batches = batches.len();
                error!(
                    "Failed to write {} pending delete batches to {}: {}",
                    batches.len(),
                    self.fallback.path().display(),
                    e
                );
            }
        }

        report
    }
}

async fn apply(repository: Arc<dyn UrlRepository>, batches: Vec<DeleteRequestBatch>) {
    let keys: usize = batches.iter().map(|b| b.short_keys.len()).sum();
    match repository.delete(&batches).await {
        Ok(()) => debug!(
            "Applied {} delete batches ({} short keys)",
            batches.len(),
            keys
        ),
        Err(e) => error!(
            "Cannot delete events, {} batches dropped: {}",
            batches.len(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Event, MemoryRepository};

    fn config(dir: &tempfile::TempDir, flush_interval_ms: u64) -> DeletionConfig {
        DeletionConfig {
            flush_interval_ms,
            queue_capacity: 8,
            drain_timeout_ms: 200,
            fallback_log_path: dir
                .path()
                .join("deleted.json")
                .to_string_lossy()
                .into_owned(),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo: Arc<dyn UrlRepository> = Arc::new(MemoryRepository::new());
        let coordinator = DeletionCoordinator::start(repo, &config(&dir, 50));

        coordinator
            .submit(DeleteRequestBatch::new("u1", Vec::new()))
            .await
            .unwrap();

        let report = coordinator.shutdown().await.unwrap();
        assert_eq!(report, ShutdownReport::default());
        assert!(!dir.path().join("deleted.json").exists());
    }

    #[tokio::test]
    async fn test_flush_applies_after_interval() {
        let dir = tempfile::TempDir::new().unwrap();
        let memory = Arc::new(MemoryRepository::new());
        let mut events = vec![Event::new("https://a.com", "u1")];
        memory.save(&mut events).await.unwrap();
        let key = events[0].short_key.clone();

        let repo: Arc<dyn UrlRepository> = memory.clone();
        let coordinator = DeletionCoordinator::start(repo, &config(&dir, 50));
        coordinator
            .submit(DeleteRequestBatch::new("u1", vec![key.clone()]))
            .await
            .unwrap();

        sleep(Duration::from_millis(200)).await;
        assert!(memory.get(&key).await.unwrap().unwrap().deleted);

        let report = coordinator.shutdown().await.unwrap();
        assert_eq!(report.persisted_batches, 0);
    }
}
