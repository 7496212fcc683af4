//! # apiary-adapter-telegram
//!
//! Telegram adapter — delivers unit chat messages through the Telegram
//! bot API.
//!
//! ## Responsibilities
//! - Queue messages behind a bounded channel; awaiting `send_message` is
//!   the caller's backpressure
//! - Deliver from a small worker pool
//! - Hand failed deliveries to the retry scheduler under the `telegram`
//!   sender identity
//!
//! ## Dependency rule
//! Depends on `apiary-app` and `apiary-domain` only; the core never
//! imports this crate.

pub mod config;
pub mod error;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use apiary_app::ports::transport::ChatTransport;
use apiary_app::retry::{RetryScheduler, RetryTask};

pub use config::TelegramConfig;
pub use error::TelegramError;

const RETRY_SENDER: &str = "telegram";

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    url: String,
    chat_ids: Vec<i64>,
}

impl ApiClient {
    /// Fan one message out to every configured chat. The first failure
    /// aborts the pass; a retry re-sends to every chat.
    async fn send(&self, text: &str) -> Result<(), TelegramError> {
        for &chat_id in &self.chat_ids {
            self.send_to(chat_id, text).await?;
        }
        Ok(())
    }

    async fn send_to(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let response = self
            .http
            .post(&self.url)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(TelegramError::Http)?;
        let status = response.status();
        if !status.is_success() {
            let description = response.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                description,
            });
        }
        Ok(())
    }
}

fn endpoint(api_base: &str, token: &str) -> String {
    format!("{}/bot{token}/sendMessage", api_base.trim_end_matches('/'))
}

/// Outbound chat handle given to the unit host. Cheap to clone.
#[derive(Clone)]
pub struct TelegramChat {
    queue: mpsc::Sender<String>,
}

#[async_trait]
impl ChatTransport for TelegramChat {
    async fn send_message(&self, text: String) {
        if self.queue.send(text).await.is_err() {
            warn!("telegram workers are gone, dropping message");
        }
    }
}

/// Delivery workers behind the queue. Must be started with
/// [`run`](Self::run); nothing is delivered until then.
pub struct WorkerPool {
    client: ApiClient,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    workers: usize,
    retries: Arc<RetryScheduler>,
}

impl TelegramChat {
    #[must_use]
    pub fn new(config: &TelegramConfig, retries: Arc<RetryScheduler>) -> (Self, WorkerPool) {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let pool = WorkerPool {
            client: ApiClient {
                http: reqwest::Client::new(),
                url: endpoint(&config.api_base, &config.token),
                chat_ids: config.chat_ids.clone(),
            },
            queue: Arc::new(tokio::sync::Mutex::new(queue_rx)),
            workers: config.workers.max(1),
            retries,
        };
        (Self { queue: queue_tx }, pool)
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
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    retries: Arc<RetryScheduler>,
    cancel: CancellationToken,
) {
    loop {
        let text = tokio::select! {
            () = cancel.cancelled() => break,
            received = async { queue.lock().await.recv().await } => match received {
                Some(text) => text,
                None => break,
            },
        };

        if let Err(err) = client.send(&text).await {
            warn!(worker, error = %err, "telegram delivery failed, scheduling retry");
            let client = client.clone();
            retries.submit(RetryTask::new(RETRY_SENDER, move || {
                let client = client.clone();
                let text = text.clone();
                async move { client.send(&text).await.map_err(TelegramError::into_domain) }
            }));
        }
    }
    debug!(worker, "telegram worker stopped");
}
