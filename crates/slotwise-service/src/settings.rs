//! Service settings, loaded once at startup and injected everywhere.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use slotwise_admission::CodeSettings;
use slotwise_booking::{EngineConfig, SearchSettings};
use slotwise_crypto::{EncryptionKey, SigningKey, VerifyingKey};
use slotwise_gate::GateConfig;
use slotwise_types::bytes::{hex_bytes, hex_bytes_list};
use slotwise_types::CodeActor;

/// Why settings could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

impl SettingsError {
    fn invalid(field: &'static str, message: impl fmt::Display) -> Self {
        Self::Invalid {
            field,
            message: message.to_string(),
        }
    }
}

/// Code checking per actor class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    pub user: CodeSettings,
    pub provider: CodeSettings,
}

impl CodeConfig {
    pub fn for_actor(&self, actor: CodeActor) -> CodeSettings {
        match actor {
            CodeActor::User => self.user,
            CodeActor::Provider => self.provider,
        }
    }
}

/// Everything the service needs to know about its deployment.
///
/// Key material is hex encoded in TOML. `token_key` is the private half of
/// the key that signs user tokens; every other key is public.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(with = "hex_bytes_list")]
    pub root_keys: Vec<Vec<u8>>,
    #[serde(with = "hex_bytes")]
    pub token_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub provider_data_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub priority_token_secret: Vec<u8>,
    #[serde(default = "default_signature_window_secs")]
    pub signature_window_secs: u64,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub codes: CodeConfig,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default = "default_retention_days")]
    pub appointment_retention_days: u32,
    #[serde(default)]
    pub allow_reset: bool,
}

fn default_signature_window_secs() -> u64 {
    300
}

fn default_lock_timeout_ms() -> u64 {
    100
}

fn default_retention_days() -> u32 {
    7
}

impl Settings {
    /// Settings with the given keys and every tunable at its default.
    pub fn new(
        root_keys: Vec<Vec<u8>>,
        token_key: Vec<u8>,
        provider_data_key: Vec<u8>,
        priority_token_secret: Vec<u8>,
    ) -> Self {
        Self {
            root_keys,
            token_key,
            provider_data_key,
            priority_token_secret,
            signature_window_secs: default_signature_window_secs(),
            lock_timeout_ms: default_lock_timeout_ms(),
            codes: CodeConfig::default(),
            search: SearchSettings::default(),
            appointment_retention_days: default_retention_days(),
            allow_reset: false,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Check that every key parses and every limit is usable.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.root_keys.is_empty() {
            return Err(SettingsError::invalid("root_keys", "at least one root key is required"));
        }
        for key in &self.root_keys {
            VerifyingKey::from_bytes(key).map_err(|e| SettingsError::invalid("root_keys", e))?;
        }
        self.token_signing_key()?;
        EncryptionKey::validate_public(&self.provider_data_key)
            .map_err(|e| SettingsError::invalid("provider_data_key", e))?;
        if self.priority_token_secret.len() < 16 {
            return Err(SettingsError::invalid(
                "priority_token_secret",
                "must be at least 16 bytes",
            ));
        }
        if self.signature_window_secs == 0 {
            return Err(SettingsError::invalid("signature_window_secs", "must be positive"));
        }
        let radius = self.search.max_radius_km;
        if radius.is_nan() || radius <= 0.0 {
            return Err(SettingsError::invalid("search.max_radius_km", "must be positive"));
        }
        if self.search.max_range_days == 0 {
            return Err(SettingsError::invalid("search.max_range_days", "must be positive"));
        }
        Ok(())
    }

    pub fn token_signing_key(&self) -> Result<SigningKey, SettingsError> {
        SigningKey::from_bytes(&self.token_key).map_err(|e| SettingsError::invalid("token_key", e))
    }

    pub fn signature_window(&self) -> Duration {
        Duration::from_secs(self.signature_window_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Trust gate configuration; `token_public_key` is the public half of
    /// [`Self::token_key`].
    pub fn gate_config(&self, token_public_key: Vec<u8>) -> GateConfig {
        GateConfig::new(self.root_keys.clone(), token_public_key)
            .with_signature_window(self.signature_window())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            search: self.search,
            retention: TimeDelta::days(i64::from(self.appointment_retention_days)),
            root_keys: self.root_keys.clone(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("root_keys", &self.root_keys.len())
            .field("token_key", &"<redacted>")
            .field("provider_data_key", &hex::encode(&self.provider_data_key))
            .field("priority_token_secret", &"<redacted>")
            .field("signature_window_secs", &self.signature_window_secs)
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .field("codes", &self.codes)
            .field("search", &self.search)
            .field("appointment_retention_days", &self.appointment_retention_days)
            .field("allow_reset", &self.allow_reset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_toml() -> (String, SigningKey) {
        let root = SigningKey::generate();
        let token = SigningKey::generate();
        let toml = format!(
            "root_keys = [\"{}\"]\n\
             token_key = \"{}\"\n\
             provider_data_key = \"{}\"\n\
             priority_token_secret = \"{}\"\n",
            hex::encode(root.verifying_key().to_bytes()),
            hex::encode(token.to_bytes()),
            hex::encode(EncryptionKey::generate().public_key_bytes()),
            hex::encode([0x5a; 32]),
        );
        (toml, token)
    }

    #[test]
    fn minimal_toml_takes_defaults() {
        let (toml, token) = keys_toml();
        let settings = Settings::from_toml_str(&toml).unwrap();
        assert_eq!(settings.signature_window(), Duration::from_secs(300));
        assert_eq!(settings.lock_timeout(), Duration::from_millis(100));
        assert_eq!(settings.appointment_retention_days, 7);
        assert!(!settings.allow_reset);
        assert!(settings.codes.user.enabled);
        assert_eq!(settings.search.max_providers, 20);
        assert_eq!(
            settings.token_signing_key().unwrap().verifying_key().to_bytes(),
            token.verifying_key().to_bytes()
        );
    }

    #[test]
    fn nested_tables_override_defaults() {
        let (mut toml, _) = keys_toml();
        toml.push_str(
            "allow_reset = true\n\
             [codes.user]\nenabled = false\n\
             [codes.provider]\nreuse_limit = 3\n\
             [search]\nmax_radius_km = 25.0\n",
        );
        let settings = Settings::from_toml_str(&toml).unwrap();
        assert!(settings.allow_reset);
        assert!(!settings.codes.for_actor(CodeActor::User).enabled);
        assert_eq!(settings.codes.for_actor(CodeActor::Provider).reuse_limit, 3);
        assert_eq!(settings.search.max_radius_km, 25.0);
        assert_eq!(settings.search.max_appointments_per_provider, 20);
        assert_eq!(settings.engine_config().retention, TimeDelta::days(7));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let (toml, _) = keys_toml();
        let broken = toml.replacen("token_key = \"", "token_key = \"00", 1);
        assert!(matches!(
            Settings::from_toml_str(&broken),
            Err(SettingsError::Invalid { field: "token_key", .. })
        ));
        let no_roots = format!("root_keys = []\n{}", toml.lines().skip(1).collect::<Vec<_>>().join("\n"));
        assert!(matches!(
            Settings::from_toml_str(&no_roots),
            Err(SettingsError::Invalid { field: "root_keys", .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let (toml, _) = keys_toml();
        let settings = Settings::from_toml_str(&toml).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains(&hex::encode(&settings.token_key)));
        assert!(!debug.contains(&hex::encode(&settings.priority_token_secret)));
    }
}
