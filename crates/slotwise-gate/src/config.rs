use std::time::Duration;

use serde::{Deserialize, Serialize};
use slotwise_types::bytes::{hex_bytes, hex_bytes_list};

/// Default freshness window for signed payloads.
pub const DEFAULT_SIGNATURE_WINDOW: Duration = Duration::from_secs(300);

/// Configuration for the trust gate.
///
/// Built once at startup from service settings and injected; the gate never
/// reads keys from anywhere else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Public signing keys of the root authority.
    #[serde(with = "hex_bytes_list")]
    pub root_keys: Vec<Vec<u8>>,
    /// Public half of the server key that signs user tokens.
    #[serde(with = "hex_bytes")]
    pub token_key: Vec<u8>,
    /// Maximum distance between a payload timestamp and server time.
    pub signature_window: Duration,
}

impl GateConfig {
    pub fn new(root_keys: Vec<Vec<u8>>, token_key: Vec<u8>) -> Self {
        Self {
            root_keys,
            token_key,
            signature_window: DEFAULT_SIGNATURE_WINDOW,
        }
    }

    pub fn with_signature_window(mut self, window: Duration) -> Self {
        self.signature_window = window;
        self
    }

    pub fn is_root_key(&self, public_key: &[u8]) -> bool {
        self.root_keys.iter().any(|k| k == public_key)
    }
}
