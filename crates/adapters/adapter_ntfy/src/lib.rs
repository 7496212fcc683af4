//! # apiary-adapter-ntfy
//!
//! ntfy adapter — pushes unit notifications to an ntfy server.
//!
//! ## Responsibilities
//! - Queue notifications behind a bounded channel; awaiting `push` is the
//!   caller's backpressure
//! - Deliver as `POST {server}/{topic}` with the message body as payload
//!   and title/priority/attachment as headers
//! - Hand failed deliveries to the retry scheduler under the `ntfy`
//!   sender identity
//!
//! ## Dependency rule
//! Depends on `apiary-app` and `apiary-domain` only; the core never
//! imports this crate.

pub mod config;
pub mod error;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use apiary_app::ports::transport::NotificationTransport;
use apiary_app::retry::{RetryScheduler, RetryTask};
use apiary_domain::notification::Notification;

pub use config::NtfyConfig;
pub use error::NtfyError;

const RETRY_SENDER: &str = "ntfy";

#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    server: String,
    default_priority: String,
}

impl ApiClient {
    async fn send(&self, notification: &Notification) -> Result<(), NtfyError> {
        let url = format!(
            "{}/{}",
            self.server.trim_end_matches('/'),
            notification.topic
        );
        let mut request = self.http.post(url).body(notification.body.clone());
        if !notification.title.is_empty() {
            request = request.header("Title", &notification.title);
        }
        let priority = if notification.priority.is_empty() {
            &self.default_priority
        } else {
            &notification.priority
        };
        request = request.header("Priority", priority);
        if !notification.attach.is_empty() {
            request = request.header("Attach", &notification.attach);
        }

        let response = request.send().await.map_err(NtfyError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(NtfyError::Api {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Outbound notification handle given to the unit host. Cheap to clone.
#[derive(Clone)]
pub struct NtfyNotifier {
    queue: mpsc::Sender<Notification>,
}

#[async_trait]
impl NotificationTransport for NtfyNotifier {
    async fn push(&self, notification: Notification) {
        if self.queue.send(notification).await.is_err() {
            warn!("ntfy workers are gone, dropping notification");
        }
    }
}

/// Delivery workers behind the queue. Must be started with
/// [`run`](Self::run); nothing is delivered until then.
pub struct WorkerPool {
    client: ApiClient,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Notification>>>,
    workers: usize,
    retries: Arc<RetryScheduler>,
}

impl NtfyNotifier {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built from the configured
    /// timeout/TLS settings.
    pub fn new(
        config: &NtfyConfig,
        retries: Arc<RetryScheduler>,
    ) -> Result<(Self, WorkerPool), NtfyError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(NtfyError::Http)?;
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let pool = WorkerPool {
            client: ApiClient {
                http,
                server: config.server.clone(),
                default_priority: config.default_priority.clone(),
            },
            queue: Arc::new(tokio::sync::Mutex::new(queue_rx)),
            workers: config.workers.max(1),
            retries,
        };
        Ok((Self { queue: queue_tx }, pool))
    }
}

impl WorkerPool {
    /// Spawn the delivery workers.
    pub fn run(self, cancel: CancellationToken) {
        for worker in 0..self.workers {
            let client = self.client.clone();
            let queue = Arc::clone(&self.queue);
            let retries = Arc::clone(&self.retries);
            let cancel = cancel.clone();
            tokio::spawn(worker_loop(worker, client, queue, retries, cancel));
        }
    }
}

async fn worker_loop(
    worker: usize,
    client: ApiClient,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Notification>>>,
    retries: Arc<RetryScheduler>,
    cancel: CancellationToken,
) {
    loop {
        let notification = tokio::select! {
            () = cancel.cancelled() => break,
            received = async { queue.lock().await.recv().await } => match received {
                Some(notification) => notification,
                None => break,
            },
        };

        if let Err(err) = client.send(&notification).await {
            warn!(worker, topic = notification.topic, error = %err, "ntfy delivery failed, scheduling retry");
            let client = client.clone();
            retries.submit(RetryTask::new(RETRY_SENDER, move || {
                let client = client.clone();
                let notification = notification.clone();
                async move { client.send(&notification).await.map_err(NtfyError::into_domain) }
            }));
        }
    }
    debug!(worker, "ntfy worker stopped");
}
