//! Generic `PubSub` implementation over a subscriber/publisher pair

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::connection::{Connections, Ownership, PublisherConnection, SubscriberConnection};
use crate::error::Result;
use crate::pubsub::{MessageCallback, PubSub};
use crate::registry::SubscriptionRegistry;

/// Adapter exposing a broker client's subscriber and publisher connections
/// through the [`PubSub`] contract
///
/// Subscriptions are tracked per instance in a [`SubscriptionRegistry`]. The
/// subscriber connection routes every message through the registry, so a
/// channel receives messages only while it is registered.
///
/// Mutating operations take `&mut self`: one instance never runs two
/// `subscribe` calls at once, which keeps the duplicate check and the
/// registry insert from racing. Share an adapter across tasks behind a
/// `tokio::sync::Mutex`.
pub struct PubSubAdapter<S, P>
where
    S: SubscriberConnection,
    P: PublisherConnection<Options = S::Options>,
{
    subscriber: S,
    publisher: P,
    ownership: Ownership,
    registry: SubscriptionRegistry,
}

impl<S, P> PubSubAdapter<S, P>
where
    S: SubscriberConnection,
    P: PublisherConnection<Options = S::Options>,
{
    /// Create an adapter, connecting any connection that is not ready yet
    pub async fn new(connections: Connections<S, P>) -> Result<Self> {
        let ownership = connections.ownership();
        let (subscriber, publisher) = match connections {
            Connections::Options(options) => (S::open(&options)?, P::open(&options)?),
            Connections::Provided { subscriber, publisher } => (subscriber, publisher),
        };

        let registry = SubscriptionRegistry::new();
        subscriber.on_message(registry.handler()).await;

        if !subscriber.is_ready().await {
            subscriber.connect().await?;
        }
        if !publisher.is_ready().await {
            if let Err(e) = publisher.connect().await {
                // Only an owned subscriber is ours to close
                if ownership == Ownership::SelfOwned {
                    if let Err(close) = subscriber.disconnect().await {
                        warn!(error = %close, "Failed to close subscriber after publisher connect failure");
                    }
                }
                return Err(e);
            }
        }

        info!(client = subscriber.name(), ownership = ?ownership, "PubSub adapter ready");

        Ok(Self {
            subscriber,
            publisher,
            ownership,
            registry,
        })
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.registry.contains(channel)
    }

    /// Whether both connections are ready
    pub async fn is_ready(&self) -> bool {
        self.subscriber.is_ready().await && self.publisher.is_ready().await
    }

    pub fn subscriber(&self) -> &S {
        &self.subscriber
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

#[async_trait]
impl<S, P> PubSub for PubSubAdapter<S, P>
where
    S: SubscriberConnection,
    P: PublisherConnection<Options = S::Options>,
{
    async fn subscribe(&mut self, channel: &str, callback: MessageCallback) -> Result<()> {
        // Registered before SUBSCRIBE so messages that arrive right after the
        // acknowledgement are already routable
        self.registry.insert(channel, callback)?;

        if let Err(e) = self.subscriber.subscribe(channel).await {
            warn!(channel, error = %e, "Subscribe failed, rolling back registry entry");
            self.registry.remove(channel);
            return Err(e);
        }

        info!(channel, "Subscribed");
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let receivers = self.publisher.publish(channel, message).await?;
        debug!(channel, receivers, "Published");
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: Option<&str>) -> Result<()> {
        if self.registry.is_empty() {
            return Ok(());
        }

        match channel {
            Some(channel) => {
                if !self.registry.contains(channel) {
                    return Ok(());
                }
                self.subscriber.unsubscribe(&[channel.to_string()]).await?;
                self.registry.remove(channel);
                info!(channel, "Unsubscribed");
            }
            None => {
                let channels = self.registry.channels();
                self.subscriber.unsubscribe(&channels).await?;
                self.registry.clear();
                info!(count = channels.len(), "Unsubscribed from all channels");
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.ownership == Ownership::Provided {
            return Ok(());
        }

        self.subscriber.disconnect().await?;
        self.publisher.disconnect().await?;
        info!(client = self.subscriber.name(), "PubSub adapter disconnected");
        Ok(())
    }

    fn subscriptions(&self) -> Vec<String> {
        self.registry.channels()
    }

    fn name(&self) -> &'static str {
        self.subscriber.name()
    }
}
