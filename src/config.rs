use crate::core::{Result, StoreError};
use crate::storage::ContentCodec;
use http::HeaderName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Entity store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Engine partition the store reads and writes
    pub namespace: String,

    /// Prepended to every logical key
    pub key_prefix: String,

    /// Commit attempts per transaction before a conflict is returned
    pub max_transaction_attempts: u32,

    /// Encoding of opaque entity content
    pub codec: ContentCodec,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            namespace: "tokengate".to_string(),
            key_prefix: String::new(),
            max_transaction_attempts: 3,
            codec: ContentCodec::Json,
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts;
        self
    }

    pub fn codec(mut self, codec: ContentCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_transaction_attempts == 0 {
            return Err(StoreError::Config("max_transaction_attempts must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Server configuration, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,

    pub store: StoreConfig,

    /// Request path to billable endpoint name
    pub url_endpoints: HashMap<String, String>,

    /// Return internal error messages to clients instead of a generic failure
    pub expose_errors: bool,

    /// Per-request deadline
    pub request_timeout_ms: Option<u64>,

    /// Header a trusted fronting proxy sets to the authenticated user
    pub user_header: Option<String>,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            store: StoreConfig::new(),
            url_endpoints: HashMap::new(),
            expose_errors: false,
            request_timeout_ms: None,
            user_header: None,
        }
    }

    pub fn listen_addr(mut self, addr: &str) -> Self {
        self.listen_addr = addr.to_string();
        self
    }

    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Map a request path to a billable endpoint
    pub fn endpoint(mut self, path: &str, endpoint: &str) -> Self {
        self.url_endpoints.insert(path.to_string(), endpoint.to_string());
        self
    }

    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn user_header(mut self, header: &str) -> Self {
        self.user_header = Some(header.to_string());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| StoreError::Config(format!("invalid listen_addr '{}': {}", self.listen_addr, e)))
    }

    pub fn user_header_name(&self) -> Result<Option<HeaderName>> {
        self.user_header
            .as_deref()
            .map(|h| {
                HeaderName::from_bytes(h.as_bytes())
                    .map_err(|e| StoreError::Config(format!("invalid user_header '{}': {}", h, e)))
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.socket_addr()?;
        self.user_header_name()?;

        for (path, endpoint) in &self.url_endpoints {
            if !path.starts_with('/') {
                return Err(StoreError::Config(format!("endpoint path '{}' must start with '/'", path)));
            }
            if endpoint.is_empty() {
                return Err(StoreError::Config(format!("endpoint name for '{}' cannot be empty", path)));
            }
        }

        if self.request_timeout_ms == Some(0) {
            return Err(StoreError::Config("request_timeout_ms must be > 0".into()));
        }

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}
