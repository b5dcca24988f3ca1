use std::{
    panic::AssertUnwindSafe,
    path::PathBuf,
    str::FromStr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::FutureExt;
use tokio::{
    sync::mpsc::{
        self,
        error::{SendTimeoutError, TrySendError},
    },
    task::JoinHandle,
};

use crate::{
    constants::DEFAULT_POOL_SIZE,
    core::{
        domain::{ExecutionTask, RunOutput, TaskCompletion},
        errors::{JudgeError, PoolError},
        traits::runner::Runner,
    },
};

/// What `submit` does when the pool queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Wait for a free queue slot for as long as it takes.
    #[default]
    Block,
    /// Fail with [`PoolError::Saturated`] right away.
    Reject,
    /// Wait at most the given duration, then fail with
    /// [`PoolError::AdmissionTimeout`].
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid admission policy {0:?}, expected `block`, `reject` or a timeout in milliseconds")]
pub struct InvalidAdmissionPolicy(pub String);

impl FromStr for AdmissionPolicy {
    type Err = InvalidAdmissionPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(AdmissionPolicy::Block),
            "reject" => Ok(AdmissionPolicy::Reject),
            other => other
                .parse::<u64>()
                .map(|ms| AdmissionPolicy::Timeout(Duration::from_millis(ms)))
                .map_err(|_| InvalidAdmissionPolicy(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub size: usize,
    pub queue_capacity: usize,
    pub admission: AdmissionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            queue_capacity: DEFAULT_POOL_SIZE,
            admission: AdmissionPolicy::Block,
        }
    }
}

#[derive(Debug, Default)]
struct PoolStats {
    running: AtomicUsize,
    peak_running: AtomicUsize,
    completed: AtomicU64,
}

impl PoolStats {
    fn enter(&self) {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<ExecutionTask>>>;

/// A fixed set of worker slots running [`ExecutionTask`]s.
///
/// Workers are spawned once by [`ExecutionPool::start`] and live until
/// [`ExecutionPool::shutdown`] or until the pool is dropped. At most `size`
/// tasks run at any instant; the rest wait in a bounded queue.
#[derive(Debug)]
pub struct ExecutionPool {
    size: usize,
    admission: AdmissionPolicy,
    queue: Mutex<Option<mpsc::Sender<ExecutionTask>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PoolStats>,
}

impl ExecutionPool {
    /// Spawns the workers. Must be called from within a tokio runtime.
    pub fn start(config: PoolConfig, runner: Arc<dyn Runner>) -> Result<Self, PoolError> {
        if config.size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let queue_rx: SharedQueue = Arc::new(tokio::sync::Mutex::new(queue_rx));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..config.size)
            .map(|slot| spawn_worker(slot, queue_rx.clone(), runner.clone(), stats.clone()))
            .collect();

        tracing::info!(
            "Execution pool started: size={}, queue_capacity={}, admission={:?}",
            config.size,
            config.queue_capacity,
            config.admission
        );

        Ok(Self {
            size: config.size,
            admission: config.admission,
            queue: Mutex::new(Some(queue_tx)),
            workers: tokio::sync::Mutex::new(workers),
            stats,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of tasks being executed right now.
    pub fn running(&self) -> usize {
        self.stats.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running tasks seen so far.
    pub fn peak_running(&self) -> usize {
        self.stats.peak_running.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.stats.completed.load(Ordering::SeqCst)
    }

    /// Builds a task, submits it and waits for its result.
    pub async fn run(
        &self,
        executable_path: PathBuf,
        input: Vec<u8>,
        timeout: Duration,
    ) -> Result<RunOutput, JudgeError> {
        let (task, completion) = ExecutionTask::new(executable_path, input, timeout);
        self.submit(task, completion).await
    }

    /// Hands `task` to a worker and waits until that worker signals
    /// `completion`.
    #[tracing::instrument(skip_all, fields(task_id = %task.id))]
    pub async fn submit(
        &self,
        task: ExecutionTask,
        completion: TaskCompletion,
    ) -> Result<RunOutput, JudgeError> {
        self.dispatch(task).await?;
        tracing::debug!("Task dispatched");

        let result = completion.await.map_err(|_| PoolError::WorkerLost)?;
        Ok(result?)
    }

    async fn dispatch(&self, task: ExecutionTask) -> Result<(), PoolError> {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PoolError::Closed)?;

        match self.admission {
            AdmissionPolicy::Block => sender.send(task).await.map_err(|_| PoolError::Closed),
            AdmissionPolicy::Reject => sender.try_send(task).map_err(|e| match e {
                TrySendError::Full(_) => PoolError::Saturated,
                TrySendError::Closed(_) => PoolError::Closed,
            }),
            AdmissionPolicy::Timeout(wait) => {
                sender.send_timeout(task, wait).await.map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => PoolError::AdmissionTimeout(wait),
                    SendTimeoutError::Closed(_) => PoolError::Closed,
                })
            }
        }
    }

    /// Stops accepting tasks, lets the workers finish everything already
    /// queued and waits for them to exit.
    pub async fn shutdown(&self) {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for (slot, result) in futures::future::join_all(workers)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(e) = result {
                tracing::error!("Worker {} terminated abnormally: {}", slot, e);
            }
        }
        tracing::info!("Execution pool shut down");
    }
}

fn spawn_worker(
    slot: usize,
    queue: SharedQueue,
    runner: Arc<dyn Runner>,
    stats: Arc<PoolStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let task = queue.lock().await.recv().await;
            let Some(task) = task else {
                break;
            };

            tracing::debug!("Worker {} picked task {}", slot, task.id);
            stats.enter();
            let result = AssertUnwindSafe(runner.run(
                &task.executable_path,
                &task.input,
                task.timeout,
            ))
            .catch_unwind()
            .await;
            stats.leave();

            match result {
                Ok(result) => {
                    let id = task.id;
                    if !task.complete(result) {
                        tracing::debug!("Submitter of task {} stopped waiting", id);
                    }
                }
                Err(_) => {
                    // Dropping the task closes its completion channel.
                    tracing::error!("Runner panicked on task {}", task.id);
                }
            }
        }
        tracing::debug!("Worker {} stopped", slot);
    })
}
