//! redis-async subscriber connection

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use redis_async::client::PubsubConnection;
use redis_async::resp::{FromResp, RespValue};
use redstreak::{Endpoint, Error, MessageHandler, RedisOptions, Result, SubscriberConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type HandlerSlot = Arc<RwLock<Option<MessageHandler>>>;

/// Subscriber connection over `redis_async::client::PubsubConnection`
///
/// `redis-async` hands out one stream per subscribed channel. Each stream is
/// forwarded by its own task into the installed handler, so the adapter sees
/// a single `(channel, payload)` feed. Clones share the same connection.
#[derive(Clone)]
pub struct RedisAsyncSubscriber {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Endpoint,
    connect_timeout: Duration,
    conn: Mutex<Option<PubsubConnection>>,
    forwarders: DashMap<String, Forwarder>,
    handler: HandlerSlot,
    ready: Arc<AtomicBool>,
}

/// Task forwarding one channel's stream
///
/// Dropping a `PubsubStream` makes the client send UNSUBSCRIBE for its
/// channel. The stream must be gone before the channel can be subscribed
/// again, otherwise that late UNSUBSCRIBE cancels the new subscription.
struct Forwarder {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Forwarder {
    /// Wait for the stream to end on the server's UNSUBSCRIBE confirmation,
    /// cancelling it if that takes longer than `grace`
    async fn finish(mut self, grace: Duration) {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            self.cancel.cancel();
            if let Err(e) = self.task.await {
                warn!(error = %e, "Forwarder task failed");
            }
        }
    }

    /// Stop forwarding now and wait until the stream is dropped
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Forwarder task failed");
        }
    }
}

impl RedisAsyncSubscriber {
    /// Create a subscriber for an endpoint
    pub fn from_endpoint(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                connect_timeout,
                conn: Mutex::new(None),
                forwarders: DashMap::new(),
                handler: Arc::new(RwLock::new(None)),
                ready: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    fn spawn_forwarder<S>(&self, channel: String, stream: S) -> Forwarder
    where
        S: Stream<Item = std::result::Result<RespValue, redis_async::error::Error>> + Send + 'static,
    {
        let handler = self.inner.handler.clone();
        let ready = self.inner.ready.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            tokio::pin!(stream);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = stream.next() => {
                        match item {
                            Some(Ok(value)) => match String::from_resp(value) {
                                Ok(payload) => {
                                    let handler = handler.read().await.clone();
                                    if let Some(handler) = handler {
                                        handler(&channel, &payload);
                                    }
                                }
                                Err(e) => {
                                    warn!(channel = %channel, error = %e, "Dropping undecodable payload");
                                }
                            },
                            Some(Err(e)) => {
                                warn!(channel = %channel, error = %e, "Redis Pub/Sub stream failed");
                                ready.store(false, Ordering::SeqCst);
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!(channel = %channel, "Forwarder stopped");
        });

        Forwarder { cancel: token, task }
    }

    async fn stop_forwarders(&self) {
        let channels: Vec<String> = self.inner.forwarders.iter().map(|e| e.key().clone()).collect();
        for channel in channels {
            if let Some((_, forwarder)) = self.inner.forwarders.remove(&channel) {
                forwarder.stop().await;
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for entry in self.forwarders.iter() {
            entry.value().cancel.cancel();
        }
    }
}

#[async_trait]
impl SubscriberConnection for RedisAsyncSubscriber {
    type Options = RedisOptions;

    fn open(options: &RedisOptions) -> Result<Self> {
        Ok(Self::from_endpoint(crate::endpoint(options)?, options.connect_timeout()))
    }

    async fn connect(&self) -> Result<()> {
        let mut conn = self.inner.conn.lock().await;
        if conn.is_some() && self.inner.ready.load(Ordering::SeqCst) {
            return Ok(());
        }

        let builder = crate::builder(&self.inner.endpoint)?;
        let pubsub = tokio::time::timeout(self.inner.connect_timeout, builder.pubsub_connect())
            .await
            .map_err(Error::broker)?
            .map_err(Error::broker)?;

        // Streams of a previous connection are dead
        self.stop_forwarders().await;
        *conn = Some(pubsub);
        self.inner.ready.store(true, Ordering::SeqCst);
        info!(host = %self.inner.endpoint.host, port = self.inner.endpoint.port, "redis-async subscriber connected");
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    async fn on_message(&self, handler: MessageHandler) {
        *self.inner.handler.write().await = Some(handler);
    }

    async fn subscribe(&self, channel: &str) -> Result<()> {
        let conn = self.inner.conn.lock().await;
        let Some(conn) = conn.as_ref() else {
            return Err(Error::NotConnected("Subscriber"));
        };

        // A leftover stream would unsubscribe the channel when dropped, so it
        // goes before SUBSCRIBE is queued
        if let Some((_, previous)) = self.inner.forwarders.remove(channel) {
            previous.stop().await;
        }

        let stream = conn.subscribe(channel).await.map_err(Error::broker)?;
        let forwarder = self.spawn_forwarder(channel.to_string(), stream);
        self.inner.forwarders.insert(channel.to_string(), forwarder);
        debug!(channel, "SUBSCRIBE acknowledged");
        Ok(())
    }

    async fn unsubscribe(&self, channels: &[String]) -> Result<()> {
        let conn = self.inner.conn.lock().await;
        let Some(conn) = conn.as_ref() else {
            return Err(Error::NotConnected("Subscriber"));
        };

        // The client has no multi-channel UNSUBSCRIBE; the commands are
        // pipelined on the one connection
        for channel in channels {
            conn.unsubscribe(channel.as_str());
        }

        // Each stream ends once the server confirms its UNSUBSCRIBE
        for channel in channels {
            if let Some((_, forwarder)) = self.inner.forwarders.remove(channel) {
                forwarder.finish(self.inner.connect_timeout).await;
            }
        }
        debug!(channels = ?channels, "UNSUBSCRIBE acknowledged");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let conn = self.inner.conn.lock().await.take();
        self.inner.ready.store(false, Ordering::SeqCst);
        self.stop_forwarders().await;
        if conn.is_some() {
            info!("redis-async subscriber disconnected");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis-async"
    }
}
