//! Cryptographic identity for Slotwise.
//!
//! Provides P-256 ECDSA signing/verification, P-256 ECDH key agreement,
//! SHA-256 identifiers, HMAC-SHA256, and the [`SignedEnvelope`] pattern every
//! authenticated request uses.
//!
//! All crypto operations wrap established libraries.

pub mod envelope;
pub mod error;
pub mod hasher;
pub mod keys;
pub mod signer;

pub use envelope::SignedEnvelope;
pub use error::{CryptoError, CryptoResult};
pub use hasher::{hash, hash_json, hmac_sha256, verify_hmac};
pub use keys::{EncryptionKey, Key, KeyAlgorithm, KeyPurpose, KeyRole};
pub use signer::{sign, verify, Signature, SigningKey, VerifyingKey};
