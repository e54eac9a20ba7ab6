//! Redis publisher connection

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redstreak::{Error, PublisherConnection, RedisOptions, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Publisher connection over `redis::aio::ConnectionManager`
///
/// The manager reconnects on its own after connection loss. Clones share the
/// same connection.
#[derive(Clone)]
pub struct RedisPublisher {
    client: redis::Client,
    connect_timeout: Duration,
    redis: Arc<RwLock<Option<ConnectionManager>>>,
}

impl RedisPublisher {
    /// Create a publisher from an existing client
    pub fn from_client(client: redis::Client, connect_timeout: Duration) -> Self {
        Self {
            client,
            connect_timeout,
            redis: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl PublisherConnection for RedisPublisher {
    type Options = RedisOptions;

    fn open(options: &RedisOptions) -> Result<Self> {
        options.validate()?;
        let client = redis::Client::open(options.url.as_str()).map_err(Error::broker)?;
        Ok(Self::from_client(client, options.connect_timeout()))
    }

    async fn connect(&self) -> Result<()> {
        let mut conn = self.redis.write().await;
        if conn.is_some() {
            return Ok(());
        }

        let manager = tokio::time::timeout(self.connect_timeout, ConnectionManager::new(self.client.clone()))
            .await
            .map_err(Error::broker)?
            .map_err(Error::broker)?;
        *conn = Some(manager);
        info!("Redis publisher connected");
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.redis.read().await.is_some()
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        let mut conn = {
            let conn = self.redis.read().await;
            match &*conn {
                Some(m) => m.clone(),
                None => return Err(Error::NotConnected("Publisher")),
            }
        };

        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async::<usize>(&mut conn)
            .await
            .map_err(Error::broker)
    }

    async fn disconnect(&self) -> Result<()> {
        if self.redis.write().await.take().is_some() {
            info!("Redis publisher disconnected");
        }
        Ok(())
    }
}
