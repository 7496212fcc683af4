//! Outbound transport ports — chat and push-notification surfaces.
//!
//! Both are fire-and-forget from the unit's point of view: the call
//! enqueues onto the transport's bounded worker queue and awaiting it is
//! the backpressure mechanism, not an error channel. Delivery failures are
//! the transport's business (logged and handed to the retry scheduler).

use async_trait::async_trait;

use apiary_domain::notification::Notification;

/// Sends chat messages (e.g. a messenger bot).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Queue a text message for delivery. Blocks when the transport's
    /// worker queue is full.
    async fn send_message(&self, text: String);
}

/// Pushes notifications over an HTTP-style service.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Queue a notification for delivery. Blocks when the transport's
    /// worker queue is full.
    async fn push(&self, notification: Notification);
}
