use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Full-width SHA-256 content hash.
///
/// Used as a stable identifier: the hash of a provider's signing key is its
/// provider ID (see [`slotwise_types::ActorId::derive`], which agrees with
/// this function).
pub fn hash(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hash a serializable value's JSON encoding.
pub fn hash_json<T: serde::Serialize>(value: &T) -> CryptoResult<[u8; 32]> {
    let data = serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(hash(&data))
}

/// HMAC-SHA256 of `data` under `secret`.
pub fn hmac_sha256(secret: &[u8], data: &[u8]) -> CryptoResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time check of an HMAC-SHA256 tag.
pub fn verify_hmac(secret: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}
