//! Signed envelopes: a payload bundled with the exact bytes that were signed.
//!
//! The `json` field is the canonical signed byte sequence and `data` is always
//! parsed from it, never accepted separately from the wire. Verification only
//! ever looks at `json`, `signature` and `public_key`, so two encodings of the
//! "same" data can never be confused.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slotwise_types::bytes::hex_bytes;
use slotwise_types::ActorId;

use crate::error::{CryptoError, CryptoResult};
use crate::signer::{Signature, SigningKey, VerifyingKey};

/// A payload with its canonical serialization, signature and signer key.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedEnvelope<T> {
    json: String,
    data: T,
    signature: Vec<u8>,
    public_key: Vec<u8>,
}

impl<T: Serialize + DeserializeOwned> SignedEnvelope<T> {
    /// Serialize `data`, sign the bytes and bundle the result.
    pub fn sign(data: &T, key: &SigningKey) -> CryptoResult<Self> {
        let json =
            serde_json::to_string(data).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        let signature = key.sign(json.as_bytes()).to_bytes();
        let public_key = key.verifying_key().to_bytes();
        Self::from_parts(json, signature, public_key)
    }
}

impl<T: DeserializeOwned> SignedEnvelope<T> {
    /// Rebuild an envelope from wire parts, parsing `data` from `json`.
    ///
    /// This does not verify the signature; call [`Self::verify`].
    pub fn from_parts(json: String, signature: Vec<u8>, public_key: Vec<u8>) -> CryptoResult<Self> {
        let data =
            serde_json::from_str(&json).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(Self {
            json,
            data,
            signature,
            public_key,
        })
    }
}

impl<T> SignedEnvelope<T> {
    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// SEC1 public key of the claimed signer.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// ID of the claimed signer (hash of its public key).
    pub fn signer_id(&self) -> ActorId {
        ActorId::derive(&self.public_key)
    }

    /// Check the signature over `json` against the embedded public key.
    pub fn verify(&self) -> CryptoResult<()> {
        let key = VerifyingKey::from_bytes(&self.public_key)?;
        self.verify_with(&key)
    }

    /// Check the signature over `json` against a specific key.
    pub fn verify_with(&self, key: &VerifyingKey) -> CryptoResult<()> {
        let signature = Signature::from_bytes(&self.signature)?;
        key.verify(self.json.as_bytes(), &signature)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelopeRef<'a, T> {
    json: &'a str,
    data: &'a T,
    #[serde(with = "hex_bytes")]
    signature: &'a [u8],
    #[serde(with = "hex_bytes")]
    public_key: &'a [u8],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    json: String,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
    #[serde(with = "hex_bytes")]
    public_key: Vec<u8>,
}

impl<T: Serialize> Serialize for SignedEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEnvelopeRef {
            json: &self.json,
            data: &self.data,
            signature: &self.signature,
            public_key: &self.public_key,
        }
        .serialize(serializer)
    }
}

/// Any `data` field on the wire is ignored and re-derived from `json`.
impl<'de, T: DeserializeOwned> Deserialize<'de> for SignedEnvelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::deserialize(deserializer)?;
        Self::from_parts(wire.json, wire.signature, wire.public_key)
            .map_err(serde::de::Error::custom)
    }
}
