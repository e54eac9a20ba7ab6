//! The `PubSub` contract shared by every backend
//!
//! Depend on `PubSub` (usually as `Box<dyn PubSub>`) rather than on a concrete
//! backend to swap Redis drivers without touching calling code.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Callback invoked with the raw payload of each message on a subscribed channel
pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Connection-wide handler invoked with `(channel, payload)` for every message
/// the subscriber connection receives
pub type MessageHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Wrap a closure as a [`MessageCallback`]
pub fn callback<F>(f: F) -> MessageCallback
where
    F: Fn(String) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Uniform publish/subscribe interface
///
/// # Example
///
/// ```rust,ignore
/// use redstreak::{callback, PubSub};
///
/// async fn listen(pubsub: &mut dyn PubSub) -> redstreak::Result<()> {
///     pubsub
///         .subscribe("orders", callback(|msg| println!("order event: {msg}")))
///         .await?;
///     pubsub.publish("orders", "created:42").await?;
///     pubsub.unsubscribe(None).await?;
///     pubsub.disconnect().await
/// }
/// ```
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Subscribe to a channel
    ///
    /// Fails with `Error::AlreadySubscribed` if the channel already has a
    /// callback. The existing callback is left in place.
    async fn subscribe(&mut self, channel: &str, callback: MessageCallback) -> Result<()>;

    /// Publish an opaque message to a channel
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;

    /// Unsubscribe from one channel, or from every channel when `None`
    ///
    /// Unknown channels are ignored.
    async fn unsubscribe(&mut self, channel: Option<&str>) -> Result<()>;

    /// Close the connections if this instance created them
    async fn disconnect(&mut self) -> Result<()>;

    /// Currently subscribed channels, sorted
    fn subscriptions(&self) -> Vec<String>;

    /// Return the backend name (for logging)
    fn name(&self) -> &'static str;
}
