//! In-process broker backend
//!
//! Suitable for development and testing. Messages never leave the process and
//! are delivered synchronously from `publish`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::adapter::PubSubAdapter;
use crate::connection::{PublisherConnection, SubscriberConnection};
use crate::error::{Error, Result};
use crate::pubsub::MessageHandler;

/// `PubSub` over an in-process [`MemoryBroker`]
pub type MemoryPubSub = PubSubAdapter<MemorySubscriber, MemoryPublisher>;

/// Shared in-process broker
///
/// Clones share the same channels. Pass a clone as the options of
/// [`Connections::Options`](crate::Connections::Options) to open connections on it.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    /// channel -> subscriber ids, in subscription order
    channels: Arc<DashMap<String, Vec<String>>>,
    /// subscriber id -> message handler
    subscribers: Arc<DashMap<String, HandlerSlot>>,
}

type HandlerSlot = Arc<RwLock<Option<MessageHandler>>>;

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a message to every subscriber of the channel
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, channel: &str, message: &str) -> usize {
        let ids = self
            .channels
            .get(channel)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        let mut delivered = 0;
        for id in ids {
            let handler = self
                .subscribers
                .get(&id)
                .and_then(|slot| slot.read().ok().and_then(|h| h.clone()));
            if let Some(handler) = handler {
                handler(channel, message);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of subscriber connections on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Number of connected subscriber handles
    pub fn connection_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Channels with at least one subscriber
    pub fn active_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .channels
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect();
        channels.sort();
        channels
    }

    fn attach(&self, id: &str, slot: HandlerSlot) {
        self.subscribers.insert(id.to_string(), slot);
    }

    fn detach(&self, id: &str) {
        self.subscribers.remove(id);
        for mut entry in self.channels.iter_mut() {
            entry.value_mut().retain(|s| s != id);
        }
        self.channels.retain(|_, ids| !ids.is_empty());
    }

    fn add(&self, channel: &str, id: &str) {
        let mut ids = self.channels.entry(channel.to_string()).or_default();
        if !ids.iter().any(|s| s == id) {
            ids.push(id.to_string());
        }
    }

    fn remove(&self, channel: &str, id: &str) {
        let now_empty = match self.channels.get_mut(channel) {
            Some(mut ids) => {
                ids.retain(|s| s != id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.channels.remove_if(channel, |_, ids| ids.is_empty());
        }
    }
}

/// Subscriber connection on a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemorySubscriber {
    id: String,
    broker: MemoryBroker,
    handler: HandlerSlot,
    connected: Arc<AtomicBool>,
}

impl MemorySubscriber {
    pub fn new(broker: &MemoryBroker) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            broker: broker.clone(),
            handler: Arc::new(RwLock::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotConnected("Subscriber"))
        }
    }
}

#[async_trait]
impl SubscriberConnection for MemorySubscriber {
    type Options = MemoryBroker;

    fn open(broker: &MemoryBroker) -> Result<Self> {
        Ok(Self::new(broker))
    }

    async fn connect(&self) -> Result<()> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            self.broker.attach(&self.id, self.handler.clone());
            debug!(id = %self.id, "Memory subscriber connected");
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn on_message(&self, handler: MessageHandler) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = Some(handler);
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<()> {
        self.ensure_connected()?;
        self.broker.add(channel, &self.id);
        Ok(())
    }

    async fn unsubscribe(&self, channels: &[String]) -> Result<()> {
        self.ensure_connected()?;
        for channel in channels {
            self.broker.remove(channel, &self.id);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.broker.detach(&self.id);
            debug!(id = %self.id, "Memory subscriber disconnected");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

/// Publisher connection on a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemoryPublisher {
    broker: MemoryBroker,
    connected: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new(broker: &MemoryBroker) -> Self {
        Self {
            broker: broker.clone(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl PublisherConnection for MemoryPublisher {
    type Options = MemoryBroker;

    fn open(broker: &MemoryBroker) -> Result<Self> {
        Ok(Self::new(broker))
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected("Publisher"));
        }
        Ok(self.broker.publish(channel, message))
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
