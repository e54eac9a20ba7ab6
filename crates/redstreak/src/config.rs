//! Redis connection options shared by the Redis backends

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 6379;

/// Redis connection options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisOptions {
    /// Redis URL, e.g. "redis://localhost:6379" or "rediss://:password@host:6380/0"
    pub url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// A Redis URL split into its parts, for clients that do not take URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub tls: bool,
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

impl RedisOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        self.endpoint().map(|_| ())
    }

    /// Parse the URL into an [`Endpoint`]
    pub fn endpoint(&self) -> Result<Endpoint> {
        if self.url.is_empty() {
            return Err(Error::Config("Redis URL is required".to_string()));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("Invalid Redis URL {:?}: {}", self.url, e)))?;

        let tls = match url.scheme() {
            "redis" => false,
            "rediss" => true,
            other => {
                return Err(Error::Config(format!(
                    "Unsupported Redis URL scheme {:?}, expected redis:// or rediss://",
                    other
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Config(format!("Redis URL {:?} has no host", self.url)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let username = Some(decode(url.username())?).filter(|u| !u.is_empty());
        let password = url.password().map(decode).transpose()?;

        let db = match url.path().trim_start_matches('/') {
            "" => 0,
            db => db
                .parse()
                .map_err(|_| Error::Config(format!("Invalid Redis database {:?}", db)))?,
        };

        Ok(Endpoint {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password,
            db,
            tls,
        })
    }
}

/// Percent-decode a URL userinfo component
fn decode(component: &str) -> Result<String> {
    urlencoding::decode(component)
        .map(|c| c.into_owned())
        .map_err(|_| Error::Config("Redis credentials are not valid UTF-8".to_string()))
}
