//! redis-async publisher connection

use async_trait::async_trait;
use redis_async::client::PairedConnection;
use redis_async::resp_array;
use redstreak::{Endpoint, Error, PublisherConnection, RedisOptions, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Publisher connection over `redis_async::client::PairedConnection`
#[derive(Clone)]
pub struct RedisAsyncPublisher {
    endpoint: Endpoint,
    connect_timeout: Duration,
    redis: Arc<RwLock<Option<PairedConnection>>>,
}

impl RedisAsyncPublisher {
    /// Create a publisher for an endpoint
    pub fn from_endpoint(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            redis: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl PublisherConnection for RedisAsyncPublisher {
    type Options = RedisOptions;

    fn open(options: &RedisOptions) -> Result<Self> {
        Ok(Self::from_endpoint(crate::endpoint(options)?, options.connect_timeout()))
    }

    async fn connect(&self) -> Result<()> {
        let mut conn = self.redis.write().await;
        if conn.is_some() {
            return Ok(());
        }

        let builder = crate::builder(&self.endpoint)?;
        let paired = tokio::time::timeout(self.connect_timeout, builder.paired_connect())
            .await
            .map_err(Error::broker)?
            .map_err(Error::broker)?;
        *conn = Some(paired);
        info!(host = %self.endpoint.host, port = self.endpoint.port, "redis-async publisher connected");
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.redis.read().await.is_some()
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        let conn = self.redis.read().await;
        let Some(conn) = conn.as_ref() else {
            return Err(Error::NotConnected("Publisher"));
        };

        let receivers: i64 = conn
            .send(resp_array!["PUBLISH", channel, message])
            .await
            .map_err(Error::broker)?;
        Ok(usize::try_from(receivers).unwrap_or_default())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.redis.write().await.take().is_some() {
            info!("redis-async publisher disconnected");
        }
        Ok(())
    }
}
