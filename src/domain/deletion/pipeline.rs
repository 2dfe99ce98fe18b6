//! Fan-out/fan-in pipeline applying delete intents to the registry in batches.
//!
//! ```text
//!  submit ──► inbound (bounded) ──► dispatcher ──┬─► worker 0 ──┐
//!                                                ├─► worker 1 ──┼─► merged ──► coordinator ──► registry
//!                                                └─► worker N ──┘              (batch, ticker, shutdown)
//! ```
//!
//! The coordinator is the only owner of the batch buffer, the flush ticker and
//! the shutdown listener, so flushes never race with pushes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::batch::{DeleteBatch, FlushSummary};
use crate::domain::entities::{DeleteItem, DeleteTask};
use crate::domain::repositories::UrlRegistry;
use crate::error::PipelineError;
use crate::lifecycle::ShutdownListener;

/// Capacity of each worker queue and, multiplied by the worker count, of the
/// merged queue.
const STAGE_QUEUE_CAPACITY: usize = 64;

/// Number of tasks the dispatcher expands concurrently.
const ACTIVE_TASKS: usize = 16;

/// Tuning knobs for [`DeletionPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound of the inbound task queue. Submitters block once it is full.
    pub queue_capacity: usize,
    /// Number of fan-out workers.
    pub workers: usize,
    /// Period of the timed flush.
    pub flush_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            workers: 4,
            flush_interval: Duration::from_secs(10),
        }
    }
}

/// Producer handle for the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct DeletionSender {
    tx: mpsc::Sender<DeleteTask>,
    shutdown: ShutdownListener,
}

impl DeletionSender {
    pub(crate) fn new(tx: mpsc::Sender<DeleteTask>, shutdown: ShutdownListener) -> Self {
        Self { tx, shutdown }
    }

    /// Queues a delete task.
    ///
    /// Returns as soon as the task is queued. When the inbound queue is full the
    /// call waits for room; a shutdown releases waiting callers.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Closed`] once shutdown has started.
    pub async fn submit(&self, task: DeleteTask) -> Result<(), PipelineError> {
        if self.shutdown.is_shutdown() {
            return Err(PipelineError::Closed);
        }
        if task.is_empty() {
            return Ok(());
        }

        let aliases = task.aliases.len();
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            sent = self.tx.send(task) => sent.map_err(|_| PipelineError::Closed)?,
            _ = shutdown.cancelled() => return Err(PipelineError::Closed),
        }

        counter!("deletion_tasks_submitted_total").increment(1);
        debug!(aliases, "Delete task queued");
        Ok(())
    }
}

/// Running deletion pipeline.
pub struct DeletionPipeline {
    sender: DeletionSender,
    stages: Vec<JoinHandle<()>>,
    coordinator: JoinHandle<FlushSummary>,
}

impl DeletionPipeline {
    /// Spawns the dispatcher, the workers and the coordinator on the current runtime.
    ///
    /// The pipeline runs until `shutdown` fires, then drains every task accepted
    /// so far, flushes once and stops.
    pub fn spawn(
        registry: Arc<dyn UrlRegistry>,
        config: PipelineConfig,
        shutdown: ShutdownListener,
    ) -> Self {
        let workers = config.workers.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (merged_tx, merged_rx) = mpsc::channel(STAGE_QUEUE_CAPACITY * workers);

        let mut stages = Vec::with_capacity(workers + 1);
        let mut worker_txs = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = mpsc::channel(STAGE_QUEUE_CAPACITY);
            worker_txs.push(tx);
            stages.push(tokio::spawn(run_worker(id, rx, merged_tx.clone())));
        }
        drop(merged_tx);

        stages.push(tokio::spawn(run_dispatcher(
            inbound_rx,
            worker_txs,
            shutdown.clone(),
        )));

        let coordinator = tokio::spawn(run_coordinator(
            merged_rx,
            registry,
            config.flush_interval,
            shutdown.clone(),
        ));

        info!(
            workers,
            queue_capacity = config.queue_capacity,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "Deletion pipeline started"
        );

        Self {
            sender: DeletionSender::new(inbound_tx, shutdown),
            stages,
            coordinator,
        }
    }

    pub fn sender(&self) -> DeletionSender {
        self.sender.clone()
    }

    /// Waits for every stage to stop and returns the accumulated flush counters.
    ///
    /// Only completes after shutdown has been signalled (or every sender dropped).
    /// The coordinator is always awaited, even when another stage failed, so
    /// its final flush has finished by the time this returns.
    pub async fn join(self) -> Result<FlushSummary, PipelineError> {
        let Self {
            sender,
            stages,
            coordinator,
        } = self;
        drop(sender);

        let mut failed = None;
        for stage in stages {
            if let Err(e) = stage.await {
                error!("Deletion stage failed: {}", e);
                failed.get_or_insert(e);
            }
        }
        let summary = coordinator.await?;

        match failed {
            Some(e) => Err(e.into()),
            None => Ok(summary),
        }
    }
}

/// Decomposes tasks into items and spreads them round-robin over the workers.
///
/// Up to [`ACTIVE_TASKS`] queued tasks are expanded at once, one item from each
/// in turn, so a large task does not hold back the tasks queued behind it.
async fn run_dispatcher(
    mut inbound: mpsc::Receiver<DeleteTask>,
    workers: Vec<mpsc::Sender<DeleteItem>>,
    mut shutdown: ShutdownListener,
) {
    let mut next = 0usize;
    let mut active = VecDeque::new();
    let mut closed = false;

    loop {
        while active.len() < ACTIVE_TASKS {
            match inbound.try_recv() {
                Ok(task) => active.push_back(task.into_items()),
                Err(_) => break,
            }
        }

        if let Some(mut items) = active.pop_front() {
            if let Some(item) = items.next() {
                dispatch(item, &workers, &mut next).await;
                active.push_back(items);
            }
            if !closed && shutdown.is_shutdown() {
                // Refuse new tasks but keep everything already accepted.
                inbound.close();
                closed = true;
            }
            continue;
        }

        if closed {
            match inbound.recv().await {
                Some(task) => active.push_back(task.into_items()),
                None => break,
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                inbound.close();
                closed = true;
            }
            task = inbound.recv() => match task {
                Some(task) => active.push_back(task.into_items()),
                None => break,
            },
        }
    }

    debug!("Deletion dispatcher stopped");
}

async fn dispatch(item: DeleteItem, workers: &[mpsc::Sender<DeleteItem>], next: &mut usize) {
    let worker = &workers[*next % workers.len()];
    *next = next.wrapping_add(1);

    if worker.send(item).await.is_err() {
        error!("Deletion worker queue closed, item dropped");
    }
}

async fn run_worker(
    id: usize,
    mut rx: mpsc::Receiver<DeleteItem>,
    merged: mpsc::Sender<DeleteItem>,
) {
    while let Some(item) = rx.recv().await {
        if item.alias.trim().is_empty() {
            debug!(worker = id, owner_id = %item.owner_id, "Dropping blank alias");
            continue;
        }
        if merged.send(item).await.is_err() {
            warn!(worker = id, "Coordinator gone, worker stopping");
            break;
        }
    }

    debug!(worker = id, "Deletion worker stopped");
}

async fn run_coordinator(
    mut merged: mpsc::Receiver<DeleteItem>,
    registry: Arc<dyn UrlRegistry>,
    flush_interval: Duration,
    mut shutdown: ShutdownListener,
) -> FlushSummary {
    let mut batch = DeleteBatch::default();
    let mut summary = FlushSummary::default();

    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!(pending = batch.len(), "Shutdown requested, draining deletion pipeline");
                break;
            }
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    debug!(pending = batch.len(), "Timed deletion flush");
                }
                summary += batch.flush(registry.as_ref()).await;
            }
            item = merged.recv() => match item {
                Some(item) => batch.push(item),
                None => break,
            },
        }
    }

    // Upstream stages close the merged queue once everything accepted is forwarded.
    while let Some(item) = merged.recv().await {
        batch.push(item);
    }
    summary += batch.flush(registry.as_ref()).await;

    info!(
        applied = summary.applied,
        dropped = summary.dropped,
        flushes = summary.flushes,
        "Deletion pipeline stopped"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockUrlRegistry;
    use crate::lifecycle::ShutdownSignal;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_shutdown_flushes_pending_task_once() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorded = seen.clone();

        let mut mock_registry = MockUrlRegistry::new();
        mock_registry
            .expect_delete_batch()
            .times(1)
            .returning(move |owner, aliases| {
                assert_eq!(owner, "u1");
                recorded.lock().unwrap().extend(aliases.iter().cloned());
                Ok(())
            });

        let signal = ShutdownSignal::new();
        let config = PipelineConfig {
            flush_interval: Duration::from_secs(3600),
            ..PipelineConfig::default()
        };
        let pipeline = DeletionPipeline::spawn(Arc::new(mock_registry), config, signal.subscribe());

        pipeline
            .sender()
            .submit(DeleteTask::new("u1", ["AAAAAA", "BBBBBB", "CCCCCC"]))
            .await
            .unwrap();

        signal.trigger();
        let summary = pipeline.join().await.unwrap();

        assert_eq!(summary.applied, 3);
        assert_eq!(summary.flushes, 1);
        let mut aliases = seen.lock().unwrap().clone();
        aliases.sort();
        assert_eq!(aliases, vec!["AAAAAA", "BBBBBB", "CCCCCC"]);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry.expect_delete_batch().never();

        let signal = ShutdownSignal::new();
        let pipeline = DeletionPipeline::spawn(
            Arc::new(mock_registry),
            PipelineConfig::default(),
            signal.subscribe(),
        );
        let sender = pipeline.sender();

        signal.trigger();
        let result = sender.submit(DeleteTask::new("u1", ["AAAAAA"])).await;

        assert!(matches!(result, Err(PipelineError::Closed)));
        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_blocked_submitter() {
        let signal = ShutdownSignal::new();
        let (tx, _rx) = mpsc::channel(1);
        let sender = DeletionSender::new(tx, signal.subscribe());

        sender
            .submit(DeleteTask::new("u1", ["AAAAAA"]))
            .await
            .unwrap();

        let blocked = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.submit(DeleteTask::new("u1", ["BBBBBB"])).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        signal.trigger();
        let result = blocked.await.unwrap();

        assert!(matches!(result, Err(PipelineError::Closed)));
    }

    #[tokio::test]
    async fn test_empty_task_is_accepted_without_queueing() {
        let signal = ShutdownSignal::new();
        let (tx, mut rx) = mpsc::channel(1);
        let sender = DeletionSender::new(tx, signal.subscribe());

        sender
            .submit(DeleteTask::new("u1", Vec::<String>::new()))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queued_small_task_is_not_starved_by_large_task() {
        let signal = ShutdownSignal::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(4);
        let (worker_tx, mut worker_rx) = mpsc::channel(1024);

        let large: Vec<String> = (0..500).map(|i| format!("L{i:04}")).collect();
        inbound_tx.send(DeleteTask::new("u1", large)).await.unwrap();
        inbound_tx
            .send(DeleteTask::new("u2", ["SMALL0"]))
            .await
            .unwrap();
        drop(inbound_tx);

        run_dispatcher(inbound_rx, vec![worker_tx], signal.subscribe()).await;

        let mut order = Vec::new();
        while let Ok(item) = worker_rx.try_recv() {
            order.push(item.alias);
        }
        assert_eq!(order.len(), 501);
        let position = order.iter().position(|a| a == "SMALL0").unwrap();
        assert!(position < 10, "small task dispatched at {position}");
    }

    async fn crashing_stage() {
        panic!("stage crashed");
    }

    #[tokio::test]
    async fn test_join_waits_for_coordinator_when_a_stage_fails() {
        let signal = ShutdownSignal::new();
        let (tx, _rx) = mpsc::channel(1);
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let flag = finished.clone();
        let pipeline = DeletionPipeline {
            sender: DeletionSender::new(tx, signal.subscribe()),
            stages: vec![tokio::spawn(crashing_stage())],
            coordinator: tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                FlushSummary::default()
            }),
        };

        let result = pipeline.join().await;

        assert!(matches!(result, Err(PipelineError::Join(_))));
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }
}
