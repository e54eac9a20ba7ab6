//! Channel subscription registry

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pubsub::{MessageCallback, MessageHandler};

/// Channel name -> callback for every active subscription of one adapter
///
/// Clones share the same map. The adapter hands a clone to its subscriber
/// connection (through [`SubscriptionRegistry::handler`]) so incoming
/// messages are routed by channel name.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    channels: Arc<DashMap<String, MessageCallback>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, refusing to replace an existing one
    pub fn insert(&self, channel: &str, callback: MessageCallback) -> Result<()> {
        match self.channels.entry(channel.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadySubscribed(channel.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(callback);
                Ok(())
            }
        }
    }

    /// Remove a channel, returning whether it was registered
    pub fn remove(&self, channel: &str) -> bool {
        self.channels.remove(channel).is_some()
    }

    /// Remove every channel
    pub fn clear(&self) {
        self.channels.clear();
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Registered channel names, sorted
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        channels.sort();
        channels
    }

    /// Route a payload to the channel's callback
    ///
    /// Returns false when nothing is registered for the channel.
    pub fn dispatch(&self, channel: &str, payload: &str) -> bool {
        // Clone the callback out so no shard lock is held while user code runs
        let callback = match self.channels.get(channel) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        callback(payload.to_string());
        true
    }

    /// Connection-wide message handler backed by this registry
    pub fn handler(&self) -> MessageHandler {
        let registry = self.clone();
        Arc::new(move |channel: &str, payload: &str| {
            if !registry.dispatch(channel, payload) {
                tracing::debug!(channel, "Dropping message for unregistered channel");
            }
        })
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}
