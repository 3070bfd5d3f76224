//! Wrapped-key store client.
//!
//! REST client for the backend metadata service holding sealed key
//! records. The store is the only shared mutable resource in the system;
//! all mutation goes through `store` / `store_batch` / `update`, which the
//! backend serializes per owner to preserve the record uniqueness
//! invariants.
//!
//! Batch semantics are all-or-nothing: the backend validates every record
//! in a batch before persisting any, and the client pre-validates locally
//! so a malformed record aborts the batch before a single byte is sent.
//! Partial batch success is never observable.

pub mod records;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::KeywardConfig;
use crate::network::KeyNetwork;
use crate::session::SessionCredential;
use crate::types::{KeywardError, Result};

use records::{NewWrappedKey, UpdateWrappedKey, WrappedKeyMetadata, WrappedKeyRecord};

/// Fixed scheme prefix in the Authorization header.
pub const AUTH_SCHEME: &str = "KeywardSession";

/// Routing header selecting the backend network/version.
pub const ROUTING_HEADER: &str = "X-Key-Backend";

/// Persistence boundary for wrapped-key records.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Persist one record; returns the backend-minted id.
    async fn store(&self, credential: &SessionCredential, record: NewWrappedKey)
        -> Result<String>;

    /// Persist a batch atomically: either every record persists or none.
    async fn store_batch(
        &self,
        credential: &SessionCredential,
        records: Vec<NewWrappedKey>,
    ) -> Result<Vec<String>>;

    /// Fetch a record without its sealed payload.
    async fn fetch_metadata(
        &self,
        credential: &SessionCredential,
        id: &str,
    ) -> Result<WrappedKeyMetadata>;

    /// Fetch a record with its sealed payload, for operations that go on
    /// to unseal inside the execution network.
    async fn fetch_full(
        &self,
        credential: &SessionCredential,
        id: &str,
        network: KeyNetwork,
    ) -> Result<WrappedKeyRecord>;

    /// Replace the sealed payload; the prior payload is appended to the
    /// record's version history.
    async fn update(
        &self,
        credential: &SessionCredential,
        id: &str,
        update: UpdateWrappedKey,
    ) -> Result<WrappedKeyRecord>;

    /// List metadata for every record owned by the credential's resolved
    /// owner. Empty list, not an error, when the owner has none.
    async fn list_metadata(
        &self,
        credential: &SessionCredential,
    ) -> Result<Vec<WrappedKeyMetadata>>;
}

/// Encode a session credential for the Authorization header.
pub fn authorization_header(credential: &SessionCredential) -> Result<String> {
    let json = serde_json::to_string(credential)
        .map_err(|e| KeywardError::Auth(format!("credential is not serializable: {e}")))?;
    Ok(format!("{AUTH_SCHEME} {}", BASE64.encode(json)))
}

/// HTTP client for the wrapped-key store service.
pub struct StoreClient {
    http: reqwest::Client,
    store_url: String,
    backend_version: String,
}

impl StoreClient {
    pub fn new(config: &KeywardConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("keyward/0.1")
            .build()
            .unwrap_or_default();
        Self {
            http,
            store_url: config.store_url.trim_end_matches('/').to_string(),
            backend_version: config.backend_version.clone(),
        }
    }

    fn routing_value(&self, network: Option<KeyNetwork>) -> String {
        match network {
            Some(net) => format!("{}:{}", net.as_str(), self.backend_version),
            None => self.backend_version.clone(),
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        credential: &SessionCredential,
        network: Option<KeyNetwork>,
    ) -> Result<T> {
        let response = builder
            .header("Authorization", authorization_header(credential)?)
            .header(ROUTING_HEADER, self.routing_value(network))
            .send()
            .await
            .map_err(KeywardError::from_transport)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(KeywardError::from_transport)?;
        if !(200..300).contains(&status) {
            warn!(status, "Store request failed");
            return Err(KeywardError::from_response(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| KeywardError::Transport {
            status,
            message: format!("malformed store response: {e}"),
        })
    }
}

#[derive(Deserialize)]
struct StoredId {
    id: String,
}

#[derive(Deserialize)]
struct StoredIds {
    ids: Vec<String>,
}

#[async_trait]
impl KeyStore for StoreClient {
    async fn store(
        &self,
        credential: &SessionCredential,
        record: NewWrappedKey,
    ) -> Result<String> {
        record.validate()?;
        let network = record.network;
        debug!(owner = %record.owner_identity, network = %network, "Storing wrapped key");

        let url = format!("{}/wrapped-keys", self.store_url);
        let reply: StoredId = self
            .request(self.http.post(&url).json(&record), credential, Some(network))
            .await?;
        Ok(reply.id)
    }

    async fn store_batch(
        &self,
        credential: &SessionCredential,
        records: Vec<NewWrappedKey>,
    ) -> Result<Vec<String>> {
        // Local pre-flight over the whole batch. One malformed record
        // aborts everything before any network call, mirroring the
        // backend's validate-all-then-persist contract.
        for record in &records {
            record.validate()?;
        }
        debug!(count = records.len(), "Storing wrapped-key batch");

        let url = format!("{}/wrapped-keys/batch", self.store_url);
        let reply: StoredIds = self
            .request(self.http.post(&url).json(&records), credential, None)
            .await?;
        Ok(reply.ids)
    }

    async fn fetch_metadata(
        &self,
        credential: &SessionCredential,
        id: &str,
    ) -> Result<WrappedKeyMetadata> {
        let url = format!("{}/wrapped-keys/{id}/metadata", self.store_url);
        self.request(self.http.get(&url), credential, None).await
    }

    async fn fetch_full(
        &self,
        credential: &SessionCredential,
        id: &str,
        network: KeyNetwork,
    ) -> Result<WrappedKeyRecord> {
        let url = format!("{}/wrapped-keys/{id}", self.store_url);
        self.request(self.http.get(&url), credential, Some(network))
            .await
    }

    async fn update(
        &self,
        credential: &SessionCredential,
        id: &str,
        update: UpdateWrappedKey,
    ) -> Result<WrappedKeyRecord> {
        debug!(id = %id, "Updating sealed payload");
        let url = format!("{}/wrapped-keys/{id}", self.store_url);
        self.request(self.http.put(&url).json(&update), credential, None)
            .await
    }

    async fn list_metadata(
        &self,
        credential: &SessionCredential,
    ) -> Result<Vec<WrappedKeyMetadata>> {
        let url = format!("{}/wrapped-keys", self.store_url);
        self.request(self.http.get(&url), credential, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::records::NewWrappedKey;
    use super::*;
    use crate::network::{KeyNetwork, KeyType};
    use crate::session::testing::{owner_credential, TEST_OWNER};

    fn client() -> StoreClient {
        StoreClient::new(&KeywardConfig {
            // Unroutable; tests below must fail before any request is sent.
            store_url: "http://127.0.0.1:1".into(),
            ..KeywardConfig::default()
        })
    }

    fn record(public_key: &str) -> NewWrappedKey {
        NewWrappedKey {
            owner_identity: TEST_OWNER.into(),
            public_key: public_key.into(),
            key_type: KeyType::Ed25519,
            network: KeyNetwork::Solana,
            ciphertext: "c2VhbGVk".into(),
            data_to_encrypt_hash: "cd".repeat(32),
            memo: None,
        }
    }

    #[test]
    fn test_authorization_header_shape() {
        let credential = owner_credential(TEST_OWNER, Duration::from_secs(60));
        let header = authorization_header(&credential).unwrap();
        let encoded = header.strip_prefix("KeywardSession ").unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        let round_trip: SessionCredential = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(round_trip.entries.len(), credential.entries.len());
    }

    #[test]
    fn test_routing_header_value() {
        let client = client();
        assert_eq!(client.routing_value(Some(KeyNetwork::Evm)), "evm:v1");
        assert_eq!(client.routing_value(None), "v1");
    }

    #[tokio::test]
    async fn test_batch_with_malformed_record_aborts_locally() {
        let client = client();
        let credential = owner_credential(TEST_OWNER, Duration::from_secs(60));

        // Second record has no public key: the whole batch must be
        // rejected without touching the (unroutable) network.
        let err = client
            .store_batch(&credential, vec![record("solanaPub1"), record("")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("publicKey"));
        assert!(matches!(err, KeywardError::Validation(_)));
    }

    #[tokio::test]
    async fn test_store_validates_before_sending() {
        let client = client();
        let credential = owner_credential(TEST_OWNER, Duration::from_secs(60));

        let mut bad = record("solanaPub1");
        bad.data_to_encrypt_hash = "short".into();
        let err = client.store(&credential, bad).await.unwrap_err();
        assert!(matches!(err, KeywardError::Validation(_)));
    }
}
