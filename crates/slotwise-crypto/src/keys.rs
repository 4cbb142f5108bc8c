use std::fmt;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use slotwise_types::bytes::hex_bytes;
use slotwise_types::ActorId;

use crate::error::{CryptoError, CryptoResult};
use crate::signer::{Signature, SigningKey, VerifyingKey};

/// Curve algorithm a key is used with. Both are over P-256.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Ecdsa,
    Ecdh,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ecdsa => f.write_str("ECDSA"),
            Self::Ecdh => f.write_str("ECDH"),
        }
    }
}

/// What a key may be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyPurpose {
    Sign,
    Verify,
    Encrypt,
    Decrypt,
    DeriveKey,
}

/// Which party a key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyRole {
    Root,
    Token,
    ProviderData,
    Mediator,
    Provider,
    UserToken,
}

/// A named P-256 key pair with an optional private half.
///
/// This is the form keys take in configuration files: public and private
/// halves are hex encoded, and a key distributed to other parties simply
/// omits `privateKey`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub name: String,
    pub role: KeyRole,
    pub algorithm: KeyAlgorithm,
    pub purposes: Vec<KeyPurpose>,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex")]
    pub private_key: Option<Vec<u8>>,
}

impl Key {
    /// Generate a fresh key pair.
    ///
    /// ECDSA keys get the `sign`/`verify` purposes, ECDH keys `deriveKey`.
    pub fn generate(name: impl Into<String>, role: KeyRole, algorithm: KeyAlgorithm) -> Self {
        let (public_key, private_key, purposes) = match algorithm {
            KeyAlgorithm::Ecdsa => {
                let sk = SigningKey::generate();
                (
                    sk.verifying_key().to_bytes(),
                    sk.to_bytes(),
                    vec![KeyPurpose::Sign, KeyPurpose::Verify],
                )
            }
            KeyAlgorithm::Ecdh => {
                let ek = EncryptionKey::generate();
                (ek.public_key_bytes(), ek.to_bytes(), vec![KeyPurpose::DeriveKey])
            }
        };
        Self {
            name: name.into(),
            role,
            algorithm,
            purposes,
            public_key,
            private_key: Some(private_key),
        }
    }

    /// A copy of this key with the private half removed.
    pub fn public_only(&self) -> Self {
        Self {
            private_key: None,
            ..self.clone()
        }
    }

    pub fn has_purpose(&self, purpose: KeyPurpose) -> bool {
        self.purposes.contains(&purpose)
    }

    /// ID derived from the public half.
    pub fn actor_id(&self) -> ActorId {
        ActorId::derive(&self.public_key)
    }

    /// The private ECDSA half.
    pub fn signing_key(&self) -> CryptoResult<SigningKey> {
        self.expect_algorithm(KeyAlgorithm::Ecdsa)?;
        let bytes = self
            .private_key
            .as_deref()
            .ok_or_else(|| CryptoError::MissingPrivateKey(self.name.clone()))?;
        SigningKey::from_bytes(bytes)
    }

    /// The public ECDSA half.
    pub fn verifying_key(&self) -> CryptoResult<VerifyingKey> {
        self.expect_algorithm(KeyAlgorithm::Ecdsa)?;
        VerifyingKey::from_bytes(&self.public_key)
    }

    /// The private ECDH half.
    pub fn encryption_key(&self) -> CryptoResult<EncryptionKey> {
        self.expect_algorithm(KeyAlgorithm::Ecdh)?;
        let bytes = self
            .private_key
            .as_deref()
            .ok_or_else(|| CryptoError::MissingPrivateKey(self.name.clone()))?;
        EncryptionKey::from_bytes(bytes)
    }

    pub fn sign(&self, data: &[u8]) -> CryptoResult<Signature> {
        Ok(self.signing_key()?.sign(data))
    }

    /// `true` iff `signature` is a valid signature of `data` under this key.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        self.algorithm == KeyAlgorithm::Ecdsa
            && crate::signer::verify(data, signature, &self.public_key)
    }

    fn expect_algorithm(&self, algorithm: KeyAlgorithm) -> CryptoResult<()> {
        if self.algorithm == algorithm {
            Ok(())
        } else {
            Err(CryptoError::WrongAlgorithm {
                name: self.name.clone(),
                algorithm: self.algorithm.to_string(),
            })
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("algorithm", &self.algorithm)
            .field("public_key", &hex::encode(&self.public_key))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// ECDH P-256 secret key, used for key agreement.
pub struct EncryptionKey(p256::SecretKey);

impl EncryptionKey {
    pub fn generate() -> Self {
        Self(p256::SecretKey::random(&mut rand::thread_rng()))
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        p256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    /// Uncompressed SEC1 public key (65 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.0.public_key().to_encoded_point(false).as_bytes().to_vec()
    }

    /// Raw shared secret with a peer's SEC1 public key.
    pub fn diffie_hellman(&self, peer_public_key: &[u8]) -> CryptoResult<[u8; 32]> {
        let peer = p256::PublicKey::from_sec1_bytes(peer_public_key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let shared = p256::ecdh::diffie_hellman(self.0.to_nonzero_scalar(), peer.as_affine());
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.raw_secret_bytes());
        Ok(out)
    }

    /// Check that `bytes` is a SEC1 P-256 public key others can encrypt to.
    pub fn validate_public(bytes: &[u8]) -> CryptoResult<()> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(|_| ())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey(<redacted>)")
    }
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ecdsa_key_signs_and_verifies() {
        let key = Key::generate("root", KeyRole::Root, KeyAlgorithm::Ecdsa);
        assert!(key.has_purpose(KeyPurpose::Sign));
        let sig = key.sign(b"payload").unwrap();
        assert!(key.verify(b"payload", &sig.to_bytes()));
        assert!(key.public_only().verify(b"payload", &sig.to_bytes()));
        assert!(!key.verify(b"other", &sig.to_bytes()));
    }

    #[test]
    fn public_only_cannot_sign() {
        let key = Key::generate("root", KeyRole::Root, KeyAlgorithm::Ecdsa).public_only();
        assert_eq!(
            key.sign(b"x").unwrap_err(),
            CryptoError::MissingPrivateKey("root".into())
        );
    }

    #[test]
    fn ecdh_key_cannot_sign() {
        let key = Key::generate("data", KeyRole::ProviderData, KeyAlgorithm::Ecdh);
        assert!(matches!(
            key.signing_key(),
            Err(CryptoError::WrongAlgorithm { .. })
        ));
        assert!(!key.verify(b"x", &[0; 64]));
    }

    #[test]
    fn ecdh_parties_agree_on_shared_secret() {
        let a = Key::generate("a", KeyRole::Provider, KeyAlgorithm::Ecdh);
        let b = Key::generate("b", KeyRole::ProviderData, KeyAlgorithm::Ecdh);
        let ab = a.encryption_key().unwrap().diffie_hellman(&b.public_key).unwrap();
        let ba = b.encryption_key().unwrap().diffie_hellman(&a.public_key).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn validate_public_rejects_garbage() {
        let key = EncryptionKey::generate();
        assert!(EncryptionKey::validate_public(&key.public_key_bytes()).is_ok());
        assert!(EncryptionKey::validate_public(&[4; 65]).is_err());
        assert!(EncryptionKey::validate_public(&[]).is_err());
    }

    #[test]
    fn serde_roundtrip_keeps_private_half() {
        let key = Key::generate("token", KeyRole::Token, KeyAlgorithm::Ecdsa);
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("privateKey"));
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn public_only_omits_private_field() {
        let key = Key::generate("token", KeyRole::Token, KeyAlgorithm::Ecdsa).public_only();
        let json = serde_json::to_string(&key).unwrap();
        assert!(!json.contains("privateKey"));
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert!(parsed.private_key.is_none());
    }

    #[test]
    fn debug_redacts_private_half() {
        let key = Key::generate("root", KeyRole::Root, KeyAlgorithm::Ecdsa);
        let debug = format!("{key:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&hex::encode(key.private_key.as_ref().unwrap())));
    }
}
