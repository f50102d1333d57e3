//! Per-class worker groups that lease jobs and run them through the runtime.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::JobClass;
use crate::queue::JobQueue;
use crate::runtime::Runtime;

/// Worker group handle for one job class.
/// - `n` workers, each running at most one job at a time, so `n` is the
///   class's concurrency ceiling
/// - `shutdown_and_join()` stops leasing and waits for in-flight jobs
pub struct WorkerGroup {
    class: JobClass,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers for `class`.
    pub fn spawn(class: JobClass, n: usize, queue: Arc<dyn JobQueue>, runtime: Arc<Runtime>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let rt = Arc::clone(&runtime);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, class, q, rt, &mut rx).await;
            });
            joins.push(join);
        }
        tracing::info!(%class, workers = n, "worker group started");

        Self {
            class,
            shutdown_tx,
            joins,
        }
    }

    pub fn class(&self) -> JobClass {
        self.class
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Request shutdown for all workers.
    /// In-flight handlers run to completion; workers just stop taking new leases.
    pub fn request_shutdown(&self) {
        // Receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                tracing::error!(class = %self.class, error = %e, "worker task panicked");
            }
        }
        tracing::info!(class = %self.class, "worker group stopped");
    }
}

/// Every running worker group, one per job class.
#[derive(Default)]
pub struct WorkerPool {
    groups: Vec<WorkerGroup>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: WorkerGroup) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[WorkerGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Signal every group first, then wait, so groups drain in parallel.
    pub async fn shutdown(self) {
        for group in &self.groups {
            group.request_shutdown();
        }
        for group in self.groups {
            group.shutdown_and_join().await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    class: JobClass,
    queue: Arc<dyn JobQueue>,
    runtime: Arc<Runtime>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease() may wait, so race it against shutdown
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break; // Sender dropped
                }
                continue;
            }
            lease = queue.lease(class) => lease,
        };

        let lease = match lease {
            Ok(lease) => lease,
            Err(e) => {
                tracing::error!(worker_id, %class, error = %e, "lease failed");
                tokio::task::yield_now().await;
                continue;
            }
        };

        // Owned copy for the handler; the queue lock is not held here
        let job = lease.job().clone();
        tracing::debug!(worker_id, %class, job_id = %job.id, attempt = job.attempts, "job started");

        match runtime.execute(&job).await {
            Ok(()) => {
                if let Err(e) = lease.ack().await {
                    tracing::error!(worker_id, job_id = %job.id, error = %e, "ack failed");
                }
            }
            Err(err) => {
                tracing::warn!(worker_id, job_id = %job.id, attempt = job.attempts, error = %err, "job failed");
                if let Err(e) = lease.fail(err).await {
                    tracing::error!(worker_id, job_id = %job.id, error = %e, "fail report failed");
                }
            }
        }
    }
}
