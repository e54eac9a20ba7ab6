//! Broker connection traits
//!
//! Implement `SubscriberConnection` and `PublisherConnection` over a broker
//! client to plug it into [`PubSubAdapter`](crate::PubSubAdapter).

use async_trait::async_trait;

use crate::error::Result;
use crate::pubsub::MessageHandler;

/// Who is responsible for closing the connection pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Opened by the adapter from options, closed on `disconnect`
    SelfOwned,
    /// Supplied by the caller, never closed by the adapter
    Provided,
}

/// How an adapter obtains its connection pair
///
/// # Example
///
/// ```rust,ignore
/// use redstreak::{Connections, RedisOptions};
/// use redstreak_redis::RedisPubSub;
///
/// // Adapter opens and owns both connections
/// let owned = RedisPubSub::new(Connections::Options(RedisOptions::new("redis://localhost:6379"))).await?;
///
/// // Caller keeps ownership; `disconnect` on the adapter leaves them open
/// let shared = RedisPubSub::new(Connections::Provided {
///     subscriber: subscriber.clone(),
///     publisher: publisher.clone(),
/// })
/// .await?;
/// ```
pub enum Connections<S, P>
where
    S: SubscriberConnection,
{
    /// Open both connections from options
    Options(S::Options),
    /// Use existing connections
    Provided { subscriber: S, publisher: P },
}

impl<S, P> Connections<S, P>
where
    S: SubscriberConnection,
{
    pub fn ownership(&self) -> Ownership {
        match self {
            Self::Options(_) => Ownership::SelfOwned,
            Self::Provided { .. } => Ownership::Provided,
        }
    }
}

/// A connection dedicated to receiving messages
///
/// Handles are cheap clones of one underlying connection, so a caller that
/// supplies a subscriber to an adapter can keep using its own copy.
#[async_trait]
pub trait SubscriberConnection: Clone + Send + Sync + 'static {
    /// What `open` needs to create a connection
    type Options: Send + Sync;

    /// Create a handle without connecting
    fn open(options: &Self::Options) -> Result<Self>;

    /// Establish the connection. No-op when already connected.
    async fn connect(&self) -> Result<()>;

    async fn is_ready(&self) -> bool;

    /// Install the handler that receives every `(channel, payload)` pair
    ///
    /// Replaces any previously installed handler.
    async fn on_message(&self, handler: MessageHandler);

    async fn subscribe(&self, channel: &str) -> Result<()>;

    /// Unsubscribe from all given channels
    ///
    /// Clients whose UNSUBSCRIBE takes several channels send one command.
    /// Clients limited to one channel per command (`redis-async`) pipeline one
    /// UNSUBSCRIBE per channel on the same connection. Returns once the server
    /// has confirmed every channel, so a following `subscribe` to one of them
    /// is not undone.
    async fn unsubscribe(&self, channels: &[String]) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Return the client name (for logging)
    fn name(&self) -> &'static str;
}

/// A connection dedicated to publishing
#[async_trait]
pub trait PublisherConnection: Clone + Send + Sync + 'static {
    type Options: Send + Sync;

    /// Create a handle without connecting
    fn open(options: &Self::Options) -> Result<Self>;

    /// Establish the connection. No-op when already connected.
    async fn connect(&self) -> Result<()>;

    async fn is_ready(&self) -> bool;

    /// Publish a message, returning how many subscribers received it
    async fn publish(&self, channel: &str, message: &str) -> Result<usize>;

    async fn disconnect(&self) -> Result<()>;
}
