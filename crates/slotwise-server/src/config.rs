use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use slotwise_service::Settings;

use crate::error::{ServerError, ServerResult};

/// Server configuration, one TOML file.
///
/// ```toml
/// bind_addr = "127.0.0.1:8888"
///
/// [service]
/// root_keys = ["04ab..."]
/// token_key = "3c1f..."
/// provider_data_key = "04cd..."
/// priority_token_secret = "9e0a..."
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Send permissive CORS headers (browser clients on another origin).
    #[serde(default)]
    pub cors: bool,
    pub service: Settings,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8888))
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl ServerConfig {
    pub fn new(service: Settings) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
            cors: false,
            service,
        }
    }

    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))?;
        config.service.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
