//! Redis Pub/Sub subscriber connection

use async_trait::async_trait;
use redis::aio::{PubSubSink, PubSubStream};
use redstreak::{Error, MessageHandler, RedisOptions, Result, SubscriberConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type HandlerSlot = Arc<RwLock<Option<MessageHandler>>>;

/// Subscriber connection over `redis::aio::PubSub`
///
/// The connection is split into a sink, used for SUBSCRIBE/UNSUBSCRIBE, and a
/// message stream pumped by a background task into the installed handler.
/// Clones share the same connection.
///
/// # Example
///
/// ```rust,ignore
/// use redstreak::{RedisOptions, SubscriberConnection};
/// use redstreak_redis::RedisSubscriber;
///
/// let subscriber = RedisSubscriber::open(&RedisOptions::new("redis://localhost:6379"))?;
/// subscriber.connect().await?;
/// ```
#[derive(Clone)]
pub struct RedisSubscriber {
    inner: Arc<Inner>,
}

struct Inner {
    client: redis::Client,
    connect_timeout: Duration,
    session: Mutex<Option<Session>>,
    handler: HandlerSlot,
    /// Cleared by the pump when the server closes the stream
    ready: Arc<AtomicBool>,
}

struct Session {
    sink: PubSubSink,
    cancel: CancellationToken,
}

impl RedisSubscriber {
    /// Create a subscriber from an existing client
    pub fn from_client(client: redis::Client, connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                connect_timeout,
                session: Mutex::new(None),
                handler: Arc::new(RwLock::new(None)),
                ready: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Start the task that forwards stream messages to the handler
    fn spawn_pump(&self, stream: PubSubStream, cancel: CancellationToken) {
        let handler = self.inner.handler.clone();
        let ready = self.inner.ready.clone();

        tokio::spawn(async move {
            tokio::pin!(stream);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = stream.next() => {
                        match msg {
                            Some(msg) => {
                                let channel = msg.get_channel_name().to_string();
                                match msg.get_payload::<String>() {
                                    Ok(payload) => {
                                        let handler = handler.read().await.clone();
                                        if let Some(handler) = handler {
                                            handler(&channel, &payload);
                                        }
                                    }
                                    Err(e) => {
                                        warn!(channel = %channel, error = %e, "Dropping non-UTF-8 payload");
                                    }
                                }
                            }
                            None => {
                                warn!("Redis Pub/Sub stream ended");
                                ready.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                }
            }
            debug!("Redis Pub/Sub pump stopped");
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

#[async_trait]
impl SubscriberConnection for RedisSubscriber {
    type Options = RedisOptions;

    fn open(options: &RedisOptions) -> Result<Self> {
        options.validate()?;
        let client = redis::Client::open(options.url.as_str()).map_err(Error::broker)?;
        Ok(Self::from_client(client, options.connect_timeout()))
    }

    async fn connect(&self) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        if session.is_some() && self.inner.ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        // A closed stream leaves a dead session behind
        if let Some(stale) = session.take() {
            stale.cancel.cancel();
        }

        let pubsub = tokio::time::timeout(self.inner.connect_timeout, self.inner.client.get_async_pubsub())
            .await
            .map_err(Error::broker)?
            .map_err(Error::broker)?;

        let (sink, stream) = pubsub.split();
        let cancel = CancellationToken::new();
        self.spawn_pump(stream, cancel.clone());

        *session = Some(Session { sink, cancel });
        self.inner.ready.store(true, Ordering::SeqCst);
        info!("Redis subscriber connected");
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    async fn on_message(&self, handler: MessageHandler) {
        *self.inner.handler.write().await = Some(handler);
    }

    async fn subscribe(&self, channel: &str) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        let Some(session) = session.as_mut() else {
            return Err(Error::NotConnected("Subscriber"));
        };
        session.sink.subscribe(channel).await.map_err(Error::broker)?;
        debug!(channel, "SUBSCRIBE acknowledged");
        Ok(())
    }

    async fn unsubscribe(&self, channels: &[String]) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        let Some(session) = session.as_mut() else {
            return Err(Error::NotConnected("Subscriber"));
        };
        // One UNSUBSCRIBE carrying every channel
        session.sink.unsubscribe(channels.to_vec()).await.map_err(Error::broker)?;
        debug!(channels = ?channels, "UNSUBSCRIBE acknowledged");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let session = self.inner.session.lock().await.take();
        self.inner.ready.store(false, Ordering::SeqCst);
        if let Some(session) = session {
            session.cancel.cancel();
            drop(session.sink);
            info!("Redis subscriber disconnected");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
