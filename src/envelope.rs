//! Salted encryption envelope.
//!
//! Plaintext is prefixed with a fixed marker before sealing. After a
//! threshold decrypt the marker is verified and stripped: threshold
//! decryption can structurally "succeed" and still hand back garbage when
//! policy evaluation or share combination went wrong, so the prefix turns
//! silent corruption into a detectable integrity failure without a
//! dedicated MAC.

use sha2::{Digest, Sha256};

use crate::execution::SecureExecutor;
use crate::policy::AccessPolicy;
use crate::types::{KeywardError, Result};

/// Fixed marker prepended to plaintext before sealing.
pub const SALT_PREFIX: &[u8] = b"keyward_salted__";

/// A sealed payload as persisted in a wrapped-key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Base64 ciphertext from the threshold seal primitive.
    pub ciphertext: String,
    /// Hex SHA-256 of the salted plaintext. Globally unique across the
    /// store; the backend rejects a second record wrapping identical
    /// sealed bytes.
    pub data_to_encrypt_hash: String,
}

/// Prefix plaintext with the salt marker.
pub fn apply_salt(plaintext: &[u8]) -> Vec<u8> {
    let mut salted = Vec::with_capacity(SALT_PREFIX.len() + plaintext.len());
    salted.extend_from_slice(SALT_PREFIX);
    salted.extend_from_slice(plaintext);
    salted
}

/// Verify and strip the salt marker from decrypted bytes.
pub fn strip_salt(decrypted: &[u8]) -> Result<Vec<u8>> {
    match decrypted.strip_prefix(SALT_PREFIX) {
        Some(plaintext) => Ok(plaintext.to_vec()),
        None => Err(KeywardError::Integrity(
            "decrypted payload is missing the salt prefix".into(),
        )),
    }
}

/// Hex SHA-256 of the salted plaintext.
pub fn data_hash(salted: &[u8]) -> String {
    hex::encode(Sha256::digest(salted))
}

/// Salt the plaintext and seal it under the owner's policy via the
/// external threshold primitive.
pub async fn seal<E: SecureExecutor + ?Sized>(
    executor: &E,
    plaintext: &[u8],
    policy: &AccessPolicy,
) -> Result<SealedPayload> {
    let salted = apply_salt(plaintext);
    let ciphertext = executor.seal(&salted, policy).await?;
    Ok(SealedPayload {
        ciphertext,
        data_to_encrypt_hash: data_hash(&salted),
    })
}
