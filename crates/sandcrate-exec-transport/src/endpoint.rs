//! Endpoint resolution for the plugin-execution channel.

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use url::Url;

use sandcrate_exec_core::{Error, ExecutorConfig, Result};

/// Where to connect, and with which credential.
#[derive(Clone)]
pub struct Endpoint {
    url: Url,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url.as_str())
            .field("authenticated", &self.bearer_token.is_some())
            .finish()
    }
}

impl Endpoint {
    /// Parse an explicit `ws://` or `wss://` URL.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("invalid URL '{url}': {e}")))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self {
                url,
                bearer_token: None,
            }),
            other => Err(Error::Config(format!(
                "unsupported URL scheme '{other}', expected ws or wss"
            ))),
        }
    }

    /// Build the endpoint from configuration.
    ///
    /// The scheme follows `endpoint.secure`; the credential, if any, comes
    /// from `auth.bearer_token`.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        let settings = &config.endpoint;
        let raw = format!(
            "{}://{}:{}{}",
            settings.scheme(),
            settings.host,
            settings.port,
            settings.path
        );
        let endpoint = Self::new(&raw)?;
        Ok(match &config.auth.bearer_token {
            Some(token) => endpoint.with_bearer_token(token.clone()),
            None => endpoint,
        })
    }

    /// Attach a bearer credential to the upgrade request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// The resolved URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the encrypted transport is used.
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }

    /// Whether a credential will be attached.
    pub fn is_authenticated(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// Build the HTTP upgrade request.
    pub fn client_request(&self) -> Result<Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Transport(format!("invalid upgrade request: {e}")))?;

        if let Some(token) = &self.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Config(format!("invalid bearer token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}
