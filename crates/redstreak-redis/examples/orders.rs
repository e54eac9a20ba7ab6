//! Example: order events through a swappable Pub/Sub backend
//!
//! Run with: cargo run -p redstreak-redis --example orders
//!
//! Uses Redis when REDIS_URL is set, the in-process broker otherwise:
//! ```bash
//! docker run -d -p 6379:6379 redis
//! REDIS_URL=redis://127.0.0.1:6379 cargo run -p redstreak-redis --example orders
//! ```

use redstreak::{callback, Connections, MemoryBroker, MemoryPubSub, PubSub, RedisOptions};
use redstreak_redis::RedisPubSub;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redstreak=info,redstreak_redis=info".into()),
        )
        .init();

    // rediss:// needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let mut pubsub: Box<dyn PubSub> = match std::env::var("REDIS_URL") {
        Ok(url) => Box::new(RedisPubSub::new(Connections::Options(RedisOptions::new(url))).await?),
        Err(_) => Box::new(MemoryPubSub::new(Connections::Options(MemoryBroker::new())).await?),
    };
    println!("Backend: {}", pubsub.name());

    pubsub
        .subscribe("orders", callback(|msg| println!("orders <- {}", msg)))
        .await?;

    for id in 42..45 {
        pubsub.publish("orders", &format!("created:{}", id)).await?;
    }
    // Redis delivers on a background task
    tokio::time::sleep(Duration::from_millis(200)).await;

    pubsub.unsubscribe(None).await?;
    pubsub.publish("orders", "created:45").await?;
    println!("Subscribed channels after unsubscribe: {:?}", pubsub.subscriptions());

    pubsub.disconnect().await?;
    Ok(())
}
