//! Wrapped-key record schemas.
//!
//! Records persist the sealed representation of a private key plus its
//! metadata. `owner_identity`, `public_key`, `key_type`, and `network` are
//! immutable after creation; the sealed payload changes only via an
//! explicit update, which appends the prior state to `versions` instead of
//! discarding it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::{KeyNetwork, KeyType};
use crate::policy::validate_evm_address;
use crate::types::{KeywardError, Result};

/// Create body for a wrapped-key record. The backend mints the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWrappedKey {
    pub owner_identity: String,
    pub public_key: String,
    pub key_type: KeyType,
    pub network: KeyNetwork,
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl NewWrappedKey {
    /// Validate required fields before any network call. The backend runs
    /// the same checks across a whole batch before persisting anything.
    pub fn validate(&self) -> Result<()> {
        validate_evm_address(&self.owner_identity)
            .map_err(|_| KeywardError::Validation("ownerIdentity is not a valid address".into()))?;
        if self.public_key.trim().is_empty() {
            return Err(KeywardError::Validation("publicKey is required".into()));
        }
        if self.ciphertext.trim().is_empty() {
            return Err(KeywardError::Validation("ciphertext is required".into()));
        }
        if self.data_to_encrypt_hash.len() != 64
            || !self
                .data_to_encrypt_hash
                .chars()
                .all(|c| c.is_ascii_hexdigit())
        {
            return Err(KeywardError::Validation(
                "dataToEncryptHash must be a hex SHA-256 digest".into(),
            ));
        }
        Ok(())
    }
}

/// Metadata view of a stored record: everything except the sealed payload.
/// Listing operations run with this least-privilege shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyMetadata {
    pub id: String,
    pub owner_identity: String,
    pub public_key: String,
    pub key_type: KeyType,
    pub network: KeyNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub backend_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full view of a stored record, sealed payload included. Fetched only by
/// operations that go on to unseal inside the execution network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyRecord {
    #[serde(flatten)]
    pub metadata: WrappedKeyMetadata,
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    /// Prior sealed payloads, oldest first.
    #[serde(default)]
    pub versions: Vec<KeyVersion>,
}

/// A superseded sealed payload, retained on update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVersion {
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    pub replaced_at: DateTime<Utc>,
}

/// Update body: a new sealed payload for an existing record. The backend
/// appends the previous payload to `versions` before overwriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWrappedKey {
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
}
