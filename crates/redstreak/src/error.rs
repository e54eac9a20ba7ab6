//! Error types for redstreak

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in redstreak
#[derive(Error, Debug)]
pub enum Error {
    /// The channel already has a registered callback
    #[error("Already subscribed to {0}")]
    AlreadySubscribed(String),

    /// The connection was never connected or has been disconnected
    #[error("{0} connection is not connected")]
    NotConnected(&'static str),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the underlying broker client, passed through untouched
    #[error(transparent)]
    Broker(#[from] anyhow::Error),
}

impl Error {
    /// Wrap a driver error without altering it
    pub fn broker<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Broker(anyhow::Error::new(err))
    }
}
