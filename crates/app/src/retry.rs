//! Retry scheduler — backed-off redelivery of side-effecting actions.
//!
//! Senders (e.g. the chat or notification transport) submit fallible
//! actions. Each action runs once after its base delay and is retried
//! with exponential backoff until it succeeds or its attempt/time budget
//! is spent. Outstanding tasks are bounded per sender: admitting a task
//! over the bound cancels and evicts the sender's oldest one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use apiary_domain::error::ApiaryError;

const DEFAULT_TASK_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TASK_MAX_DELAY: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MAX_PROCESSING_TIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DEFAULT_EXP_FACTOR: f64 = 1.0;

/// Boxed fallible action run on every attempt.
pub type RetryAction =
    Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), ApiaryError>> + Send>> + Send + Sync>;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Outstanding-task bound per sender; `0` means unbounded.
    pub max_tasks_per_sender: usize,
    /// Ceiling for the computed backoff delay. A computed delay above the
    /// ceiling falls back to the task's *base* delay (not the ceiling).
    pub max_task_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_sender: 0,
            max_task_delay: DEFAULT_TASK_MAX_DELAY,
        }
    }
}

impl RetryConfig {
    fn normalize(&mut self) {
        if self.max_task_delay.is_zero() {
            self.max_task_delay = DEFAULT_TASK_MAX_DELAY;
        }
    }
}

/// A fallible action plus its retry policy. Zero-valued fields are
/// normalized to defaults on submission (base delay 1s, factor 1,
/// processing-time budget 7 days; `max_attempts` 0 means unlimited).
pub struct RetryTask {
    pub sender: String,
    pub action: RetryAction,
    pub delay: Duration,
    pub exp_factor: f64,
    pub max_attempts: u32,
    pub max_processing_time: Duration,
}

impl RetryTask {
    /// Create a task with default policy for the given sender identity.
    pub fn new<F, Fut>(sender: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ApiaryError>> + Send + 'static,
    {
        Self {
            sender: sender.into(),
            action: Box::new(move || Box::pin(action())),
            delay: Duration::ZERO,
            exp_factor: 0.0,
            max_attempts: 0,
            max_processing_time: Duration::ZERO,
        }
    }

    fn normalize(&mut self) {
        if self.delay.is_zero() {
            self.delay = DEFAULT_TASK_DELAY;
        }
        if self.exp_factor == 0.0 {
            self.exp_factor = DEFAULT_EXP_FACTOR;
        }
        if self.max_processing_time.is_zero() {
            self.max_processing_time = DEFAULT_MAX_PROCESSING_TIME;
        }
    }
}

struct TaskHandle {
    id: i64,
    cancel: CancellationToken,
}

/// Schedules and retries submitted tasks.
pub struct RetryScheduler {
    cfg: RetryConfig,
    tasks: Mutex<HashMap<String, Vec<TaskHandle>>>,
    next_id: AtomicI64,
}

impl RetryScheduler {
    #[must_use]
    pub fn new(mut cfg: RetryConfig) -> Arc<Self> {
        cfg.normalize();
        Arc::new(Self {
            cfg,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(0),
        })
    }

    /// Admit a task and schedule its first attempt after the base delay.
    ///
    /// When the sender is at its outstanding-task bound, the sender's
    /// oldest task is cancelled and evicted first.
    pub fn submit(self: &Arc<Self>, mut task: RetryTask) {
        task.normalize();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            let list = tasks.entry(task.sender.clone()).or_default();
            if self.cfg.max_tasks_per_sender > 0 && list.len() >= self.cfg.max_tasks_per_sender {
                let oldest = list.remove(0);
                debug!(sender = %task.sender, id = oldest.id, "sender at task bound, evicting oldest");
                oldest.cancel.cancel();
            }
            // ids are handed out in submission order, so the list stays
            // sorted and removal can binary-search by id.
            list.push(TaskHandle {
                id,
                cancel: cancel.clone(),
            });
        }

        let scheduler = Arc::clone(self);
        let max_delay = self.cfg.max_task_delay;
        tokio::spawn(async move {
            scheduler.run_task(task, id, max_delay, cancel).await;
        });
    }

    /// Number of tasks currently booked for a sender (including abandoned
    /// ones awaiting eviction).
    #[must_use]
    pub fn outstanding(&self, sender: &str) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sender)
            .map_or(0, Vec::len)
    }

    async fn run_task(
        self: Arc<Self>,
        task: RetryTask,
        id: i64,
        max_delay: Duration,
        cancel: CancellationToken,
    ) {
        let created = tokio::time::Instant::now();
        let mut attempt: u32 = 0;
        let mut delay = task.delay;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(sender = %task.sender, id, "task cancelled");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            debug!(sender = %task.sender, id, attempt, "running retry task");
            match (task.action)().await {
                Ok(()) => {
                    debug!(sender = %task.sender, id, attempt, "task completed");
                    self.remove_task(&task.sender, id);
                    return;
                }
                Err(err) => {
                    attempt += 1;
                    let attempts_spent = task.max_attempts > 0 && attempt >= task.max_attempts;
                    let time_spent = created.elapsed() > task.max_processing_time;
                    if attempts_spent || time_spent {
                        warn!(
                            sender = %task.sender,
                            id,
                            attempt,
                            error = %err,
                            "maximum number of attempts or processing time exceeded, abandoning task"
                        );
                        // Deliberately left in the sender's list; it will be
                        // evicted once the sender hits its bound again.
                        return;
                    }

                    let next = Duration::from_secs(f64::exp(task.exp_factor * f64::from(attempt)) as u64);
                    delay = if next > max_delay { task.delay } else { next };
                    debug!(
                        sender = %task.sender,
                        id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "task failed, retrying"
                    );
                }
            }
        }
    }

    fn remove_task(&self, sender: &str, id: i64) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = tasks.get_mut(sender) {
            if let Ok(idx) = list.binary_search_by_key(&id, |t| t.id) {
                list.remove(idx);
            }
        }
    }
}
