use p256::ecdsa::signature::{Signer, Verifier};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use slotwise_types::ActorId;

use crate::error::{CryptoError, CryptoResult};

/// ECDSA P-256 signing key (private).
pub struct SigningKey(p256::ecdsa::SigningKey);

/// ECDSA P-256 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(p256::ecdsa::VerifyingKey);

/// ECDSA P-256 signature in fixed-size `r || s` form.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(p256::ecdsa::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        Self(p256::ecdsa::SigningKey::random(&mut rand::thread_rng()))
    }

    /// Create from the raw 32-byte secret scalar.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        p256::ecdsa::SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// The corresponding public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(*self.0.verifying_key())
    }

    /// Sign a message (SHA-256 digest, RFC 6979 nonce).
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    /// Raw secret scalar bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }
}

impl VerifyingKey {
    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Derive the actor ID from this public key.
    pub fn to_actor_id(&self) -> ActorId {
        ActorId::derive(&self.to_bytes())
    }

    /// Uncompressed SEC1 encoding (65 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        p256::PublicKey::from(&self.0)
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Parse a SEC1-encoded public key (compressed or uncompressed).
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl Signature {
    /// Parse a 64-byte `r || s` signature.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        p256::ecdsa::Signature::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Raw `r || s` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }
}

/// Sign raw bytes. Callers serialize canonically before signing.
pub fn sign(data: &[u8], key: &SigningKey) -> Signature {
    key.sign(data)
}

/// Verify raw bytes against raw signature and public key bytes.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify(data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_bytes(signature) else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.to_bytes()))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.to_bytes()[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sign_and_verify() {
        let sk = SigningKey::generate();
        let vk = sk.verifying_key();
        let sig = sk.sign(b"hello world");
        assert!(vk.verify(b"hello world", &sig).is_ok());
    }

    #[test]
    fn verify_fails_on_wrong_message() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"correct message");
        assert_eq!(
            sk.verifying_key().verify(b"wrong message", &sig),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sk1 = SigningKey::generate();
        let sk2 = SigningKey::generate();
        let sig = sk1.sign(b"message");
        assert!(sk2.verifying_key().verify(b"message", &sig).is_err());
    }

    #[test]
    fn public_key_is_uncompressed_sec1() {
        let bytes = SigningKey::generate().verifying_key().to_bytes();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 0x04);
    }

    #[test]
    fn key_bytes_roundtrip() {
        let sk = SigningKey::generate();
        let sk2 = SigningKey::from_bytes(&sk.to_bytes()).unwrap();
        assert_eq!(sk.verifying_key(), sk2.verifying_key());

        let vk = VerifyingKey::from_bytes(&sk.verifying_key().to_bytes()).unwrap();
        assert_eq!(vk, sk.verifying_key());
    }

    #[test]
    fn actor_id_is_deterministic() {
        let vk = SigningKey::generate().verifying_key();
        assert_eq!(vk.to_actor_id(), vk.to_actor_id());
        assert_eq!(vk.to_actor_id(), ActorId::derive(&vk.to_bytes()));
    }

    #[test]
    fn raw_verify_rejects_garbage_inputs() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"data").to_bytes();
        let pk = sk.verifying_key().to_bytes();
        assert!(verify(b"data", &sig, &pk));
        assert!(!verify(b"data", &sig[..10], &pk));
        assert!(!verify(b"data", &sig, &pk[..10]));
    }

    #[test]
    fn debug_redacts_signing_key() {
        let debug = format!("{:?}", SigningKey::generate());
        assert!(debug.contains("redacted"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_bit_flip_breaks_verification(
            payload in proptest::collection::vec(any::<u8>(), 1..256),
            flip in any::<prop::sample::Index>(),
            bit in 0u8..8,
            in_signature in any::<bool>(),
        ) {
            let sk = SigningKey::generate();
            let pk = sk.verifying_key().to_bytes();
            let mut sig = sign(&payload, &sk).to_bytes();
            prop_assert!(verify(&payload, &sig, &pk));

            let mut data = payload.clone();
            if in_signature {
                let i = flip.index(sig.len());
                sig[i] ^= 1 << bit;
            } else {
                let i = flip.index(data.len());
                data[i] ^= 1 << bit;
            }
            prop_assert!(!verify(&data, &sig, &pk));
        }
    }
}
