//! Message-bus port — the publish/subscribe wire transport.

use std::future::Future;

use apiary_domain::error::ApiaryError;

/// Client for the publish/subscribe message bus.
///
/// Inbound messages are delivered on a channel handed out by the adapter's
/// constructor; this trait only covers the outbound half. Implementations
/// are cheap to clone (a handle to the underlying session).
pub trait MessageBus: Clone + Send + Sync + 'static {
    /// Establish the session.
    ///
    /// Resolves once the broker has acknowledged the connection, so callers
    /// may subscribe immediately afterwards.
    fn connect(&self) -> impl Future<Output = Result<(), ApiaryError>> + Send;

    /// Publish a payload on a topic.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), ApiaryError>> + Send;

    /// Express interest in a topic. Safe to call repeatedly for the same
    /// topic.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), ApiaryError>> + Send;
}
