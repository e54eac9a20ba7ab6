//! # redstreak
//!
//! One publish/subscribe contract over several Redis clients.
//!
//! ## Features
//!
//! - **Uniform contract**: `PubSub` exposes `subscribe`, `publish`, `unsubscribe` and `disconnect`
//!   the same way for every backend
//! - **Subscription registry**: one callback per channel, double subscriptions are rejected
//! - **Explicit ownership**: adapters either open their own connections or borrow the caller's,
//!   and never close connections they do not own
//! - **Pluggable clients**: implement `SubscriberConnection` and `PublisherConnection` to wrap
//!   another client
//! - **In-process broker**: `MemoryPubSub` for tests and local development
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use redstreak::{callback, Connections, MemoryBroker, MemoryPubSub, PubSub};
//!
//! #[tokio::main]
//! async fn main() -> redstreak::Result<()> {
//!     let broker = MemoryBroker::new();
//!     let mut pubsub = MemoryPubSub::new(Connections::Options(broker)).await?;
//!
//!     pubsub
//!         .subscribe("orders", callback(|msg| println!("received {msg}")))
//!         .await?;
//!     pubsub.publish("orders", "created:42").await?;
//!
//!     pubsub.unsubscribe(None).await?;
//!     pubsub.disconnect().await
//! }
//! ```
//!
//! ## Redis Backends
//!
//! - `redstreak-redis`: `RedisPubSub` over the `redis` crate
//! - `redstreak-redis-async`: `RedisAsyncPubSub` over the `redis-async` crate

mod adapter;
mod config;
pub mod connection;
mod error;
pub mod memory;
mod pubsub;
mod registry;

// Re-exports
pub use adapter::PubSubAdapter;
pub use config::{Endpoint, RedisOptions};
pub use connection::{Connections, Ownership, PublisherConnection, SubscriberConnection};
pub use error::{Error, Result};
pub use memory::{MemoryBroker, MemoryPubSub, MemoryPublisher, MemorySubscriber};
pub use pubsub::{callback, MessageCallback, MessageHandler, PubSub};
pub use registry::SubscriptionRegistry;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
