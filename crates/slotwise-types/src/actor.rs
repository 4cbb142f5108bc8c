use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bytes::hex_bytes;
use crate::identity::ActorId;
use crate::temporal::Timestamped;

/// Actor classes that sign up with codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeActor {
    User,
    Provider,
}

impl CodeActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for CodeActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a provider's appointments show up in searches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueData {
    pub zip_code: String,
    #[serde(default)]
    pub accessible: bool,
}

/// Payload of an actor key: the identity a higher authority vouches for.
///
/// Signed by the root authority for mediators, and by a mediator for
/// providers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorKeyData {
    /// Public ECDSA key the actor signs requests with.
    #[serde(with = "hex_bytes")]
    pub signing: Vec<u8>,
    /// Public ECDH key others encrypt data for this actor with.
    #[serde(with = "hex_bytes")]
    pub encryption: Vec<u8>,
    /// Search placement; providers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_data: Option<QueueData>,
    pub timestamp: DateTime<Utc>,
}

impl ActorKeyData {
    /// The actor's stable ID (hash of the signing key).
    pub fn actor_id(&self) -> ActorId {
        ActorId::derive(&self.signing)
    }
}

impl Timestamped for ActorKeyData {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Publicly visible provider details returned alongside search results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProviderData {
    pub name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub accessible: bool,
}

/// Payload of a user token, signed by the server's token key.
///
/// Binds the user's token public key to a priority token so that only the
/// holder of the matching private key can spend it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    /// Client-supplied hash of the user's contact data.
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    /// HMAC priority token.
    #[serde(with = "hex_bytes")]
    pub token: Vec<u8>,
    /// Queue position of the token.
    pub n: i64,
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for TokenData {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_actor_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CodeActor::User).unwrap(), "\"user\"");
        assert_eq!(CodeActor::Provider.to_string(), "provider");
    }

    #[test]
    fn actor_id_is_hash_of_signing_key() {
        let data = ActorKeyData {
            signing: vec![7; 65],
            encryption: vec![8; 65],
            queue_data: None,
            timestamp: Utc::now(),
        };
        assert_eq!(data.actor_id(), ActorId::derive(&[7; 65]));
    }

    #[test]
    fn queue_data_is_optional_on_the_wire() {
        let json = r#"{"signing":"01","encryption":"02","timestamp":"2021-05-20T10:00:00Z"}"#;
        let data: ActorKeyData = serde_json::from_str(json).unwrap();
        assert!(data.queue_data.is_none());
        let out = serde_json::to_string(&data).unwrap();
        assert!(!out.contains("queueData"));
    }
}
