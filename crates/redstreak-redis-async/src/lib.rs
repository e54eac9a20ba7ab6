//! Redis adapter for redstreak over the `redis-async` crate
//!
//! This crate provides:
//! - `RedisAsyncSubscriber`: subscriber connection over `redis_async::client::PubsubConnection`
//! - `RedisAsyncPublisher`: publisher connection over `redis_async::client::PairedConnection`
//! - `RedisAsyncPubSub`: the `PubSub` adapter combining both
//!
//! `redis-async` connects over plain TCP only, so `rediss://` URLs are rejected.
//! The database number in the URL is ignored: Pub/Sub channels are shared by
//! all databases.

mod publisher;
mod subscriber;

pub use publisher::RedisAsyncPublisher;
pub use subscriber::RedisAsyncSubscriber;

use redis_async::client::ConnectionBuilder;
use redstreak::{Endpoint, Error, RedisOptions, Result};

/// `PubSub` over the `redis-async` crate
pub type RedisAsyncPubSub = redstreak::PubSubAdapter<RedisAsyncSubscriber, RedisAsyncPublisher>;

/// Resolve options into an endpoint this client can reach
fn endpoint(options: &RedisOptions) -> Result<Endpoint> {
    let endpoint = options.endpoint()?;
    if endpoint.tls {
        return Err(Error::Config(
            "redis-async does not support rediss:// URLs".to_string(),
        ));
    }
    Ok(endpoint)
}

fn builder(endpoint: &Endpoint) -> Result<ConnectionBuilder> {
    let mut builder =
        ConnectionBuilder::new(endpoint.host.as_str(), endpoint.port).map_err(Error::broker)?;
    if let Some(username) = &endpoint.username {
        builder.username(username.as_str());
    }
    if let Some(password) = &endpoint.password {
        builder.password(password.as_str());
    }
    Ok(builder)
}
