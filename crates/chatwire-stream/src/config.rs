//! Subscription endpoint configuration.
//!
//! A chat subscription is a `GET {base}/v1/chats/subscribe?chat_id=...`.
//! The base is `http://{host}:{port}` unless an explicit base URL is set.

use crate::error::StreamError;
use chatwire_protocol::ChatId;
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8001;
const SUBSCRIBE_PATH: [&str; 3] = ["v1", "chats", "subscribe"];

/// Where and how to open one chat subscription.
#[derive(Clone)]
pub struct SubscriptionConfig {
    pub chat_id: ChatId,
    pub port: u16,
    pub host: String,
    /// Overrides `host` and `port` when set, e.g. `https://chat.example.com/api`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl SubscriptionConfig {
    pub fn new(chat_id: impl Into<ChatId>, port: u16) -> Self {
        Self {
            chat_id: chat_id.into(),
            port,
            host: DEFAULT_HOST.to_owned(),
            base_url: None,
            api_key: None,
            connect_timeout: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sent as `Authorization: Bearer <key>`.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `GET` target for this subscription: `{base}/v1/chats/subscribe?chat_id=..`.
    pub fn subscribe_url(&self) -> Result<Url, StreamError> {
        if self.chat_id.is_empty() {
            return Err(StreamError::InvalidConfig("chat id must not be empty".into()));
        }
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => format!("http://{}:{}", self.host, self.port),
        };
        let mut url = Url::parse(&base)
            .map_err(|err| StreamError::InvalidConfig(format!("invalid base url {base:?}: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| StreamError::InvalidConfig(format!("base url {base:?} cannot carry a path")))?
            .pop_if_empty()
            .extend(SUBSCRIBE_PATH);
        url.query_pairs_mut()
            .append_pair("chat_id", self.chat_id.as_str());
        Ok(url)
    }
}

impl std::fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("chat_id", &self.chat_id)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_targets_localhost_port() {
        let url = SubscriptionConfig::new("chat-1", 8001).subscribe_url().unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8001/v1/chats/subscribe?chat_id=chat-1"
        );
    }

    #[test]
    fn chat_id_is_query_encoded() {
        let url = SubscriptionConfig::new("a b&c", 9000)
            .host("localhost")
            .subscribe_url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/v1/chats/subscribe?chat_id=a+b%26c"
        );
    }

    #[test]
    fn base_url_keeps_its_prefix() {
        let url = SubscriptionConfig::new("c", 1)
            .base_url("https://chat.example.com/api/")
            .subscribe_url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://chat.example.com/api/v1/chats/subscribe?chat_id=c"
        );
    }

    #[test]
    fn invalid_config_is_reported() {
        assert!(matches!(
            SubscriptionConfig::new("", 1).subscribe_url(),
            Err(StreamError::InvalidConfig(_))
        ));
        assert!(matches!(
            SubscriptionConfig::new("c", 1).base_url("not a url").subscribe_url(),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = SubscriptionConfig::new("c", 1).api_key("sk-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
