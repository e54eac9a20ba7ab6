//! Redis adapter for redstreak over the `redis` crate
//!
//! This crate provides:
//! - `RedisSubscriber`: subscriber connection over `redis::aio::PubSub`
//! - `RedisPublisher`: publisher connection over `redis::aio::ConnectionManager`
//! - `RedisPubSub`: the `PubSub` adapter combining both
//!
//! # Example
//!
//! ```rust,ignore
//! use redstreak::{callback, Connections, PubSub, RedisOptions};
//! use redstreak_redis::RedisPubSub;
//!
//! let mut pubsub = RedisPubSub::new(Connections::Options(RedisOptions::new("redis://localhost:6379"))).await?;
//! pubsub.subscribe("orders", callback(|msg| println!("{msg}"))).await?;
//! pubsub.publish("orders", "created:42").await?;
//! ```

mod publisher;
mod subscriber;

pub use publisher::RedisPublisher;
pub use subscriber::RedisSubscriber;

/// `PubSub` over the `redis` crate
pub type RedisPubSub = redstreak::PubSubAdapter<RedisSubscriber, RedisPublisher>;
