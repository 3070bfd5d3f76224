//! Public wrapped-key lifecycle operations.
//!
//! Composes session resolution, policy building, the secure execution
//! gateway, and the store client into the generate / import / export /
//! sign / list flows. Per key id the state machine is `ABSENT → STORED`
//! (generate or import), then `STORED → STORED` for sign and export (no
//! state change) and for update (new version appended). No delete or
//! rotate operation is exposed.
//!
//! Plaintext key material exists in this process only transiently on the
//! stack during `import` (zeroized after sealing) and as the deliberate
//! return value of `export`. Nothing is cached, nothing is retried: every
//! external call is a single attempt yielding success or a typed failure.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{KeywardConfig, Operation, OwnerCardinality, ProgramId, ProgramRegistry};
use crate::envelope;
use crate::execution::programs::{
    BatchAction, BatchGenerateParams, BatchGenerateResult, ExportParams, ExportResult,
    GenerateParams, GenerateResult, SignMessageParams, SignMessageResult, SignTransactionParams,
    SignTransactionResult,
};
use crate::execution::{ExecutionClient, SecureExecutor};
use crate::network::{KeyNetwork, KeyType};
use crate::policy::AccessPolicy;
use crate::session::{self, SessionCredential};
use crate::store::records::{
    NewWrappedKey, UpdateWrappedKey, WrappedKeyMetadata, WrappedKeyRecord,
};
use crate::store::{KeyStore, StoreClient};
use crate::types::{KeywardError, Result};

/// Handle returned by generate / import: never carries key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyHandle {
    pub owner_identity: String,
    pub id: String,
    pub public_key: String,
}

/// Result of `export`: plaintext returned by explicit design. The private
/// key is cleared from memory when this value is dropped.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct ExportedKey {
    /// The decrypted private key in the network's native encoding.
    pub decrypted_private_key: String,
    #[zeroize(skip)]
    pub id: String,
    #[zeroize(skip)]
    pub owner_identity: String,
    #[zeroize(skip)]
    pub public_key: String,
    #[zeroize(skip)]
    pub key_type: KeyType,
    #[zeroize(skip)]
    pub network: KeyNetwork,
    #[zeroize(skip)]
    pub memo: Option<String>,
}

/// One entry of a batch-generation result, in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchKeyHandle {
    pub id: String,
    pub network: KeyNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub public_key: String,
    /// Signature over the action's message, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// The wrapped-key lifecycle service.
///
/// Generic over the store and executor boundaries so tests run against
/// in-memory fakes; production wiring uses the HTTP clients.
pub struct KeyLifecycle<S: KeyStore, E: SecureExecutor> {
    config: KeywardConfig,
    registry: ProgramRegistry,
    store: S,
    executor: E,
}

impl KeyLifecycle<StoreClient, ExecutionClient> {
    /// Wire the lifecycle against the HTTP store and gateway clients.
    pub fn connect(config: KeywardConfig, registry: ProgramRegistry) -> Self {
        let store = StoreClient::new(&config);
        let executor = ExecutionClient::new(&config);
        Self::new(config, registry, store, executor)
    }
}

impl<S: KeyStore, E: SecureExecutor> KeyLifecycle<S, E> {
    pub fn new(config: KeywardConfig, registry: ProgramRegistry, store: S, executor: E) -> Self {
        Self {
            config,
            registry,
            store,
            executor,
        }
    }

    /// Validate the credential and resolve the owner it acts for. Runs
    /// before any store or compute call; failures here never touch the
    /// network.
    fn authorize(&self, credential: &SessionCredential) -> Result<(String, AccessPolicy)> {
        let entry = session::select_representative(credential)?;
        session::validate_lifetime(entry, self.config.max_credential_lifetime, Utc::now())?;
        let owner = session::resolve_owner(entry)?;
        let policy = AccessPolicy::for_owner(&owner)?;
        Ok((owner, policy))
    }

    fn program(&self, op: Operation, network: KeyNetwork) -> Result<&ProgramId> {
        self.registry.program_for(op, network).ok_or_else(|| {
            KeywardError::Validation(format!(
                "no vetted program registered for {}/{}",
                op.as_str(),
                network
            ))
        })
    }

    /// Client pre-flight for the per-owner cardinality policy. The
    /// backend's uniqueness checks remain authoritative.
    async fn enforce_cardinality(
        &self,
        credential: &SessionCredential,
        owner: &str,
        networks: &[KeyNetwork],
    ) -> Result<()> {
        match self.config.cardinality {
            OwnerCardinality::Unbounded => Ok(()),
            OwnerCardinality::SinglePerOwner => {
                if networks.len() > 1 {
                    return Err(KeywardError::Validation(format!(
                        "cardinality policy allows one wrapped key for owner {owner}"
                    )));
                }
                let existing = self.store.list_metadata(credential).await?;
                if existing.is_empty() {
                    Ok(())
                } else {
                    Err(KeywardError::Validation(format!(
                        "owner {owner} already holds a wrapped key"
                    )))
                }
            }
            OwnerCardinality::PerOwnerPerNetwork => {
                let mut requested = networks.to_vec();
                requested.sort();
                if requested.windows(2).any(|w| w[0] == w[1]) {
                    return Err(KeywardError::Validation(
                        "batch requests multiple keys on the same network".into(),
                    ));
                }
                let existing = self.store.list_metadata(credential).await?;
                for net in networks {
                    if existing.iter().any(|m| m.network == *net) {
                        return Err(KeywardError::Validation(format!(
                            "owner {owner} already holds a wrapped key on {net}"
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Fetch the full record and verify the credential's owner controls it.
    async fn fetch_owned(
        &self,
        credential: &SessionCredential,
        owner: &str,
        id: &str,
        network: KeyNetwork,
    ) -> Result<WrappedKeyRecord> {
        let record = self.store.fetch_full(credential, id, network).await?;
        if record.metadata.owner_identity != owner {
            return Err(KeywardError::Auth(format!(
                "wrapped key {id} is not controlled by owner {owner}"
            )));
        }
        Ok(record)
    }

    /// Generate a key inside the secure execution network and persist the
    /// sealed record. Plaintext never leaves the sandbox on this path.
    pub async fn generate(
        &self,
        credential: &SessionCredential,
        network: KeyNetwork,
        memo: Option<String>,
    ) -> Result<KeyHandle> {
        let (owner, policy) = self.authorize(credential)?;
        self.enforce_cardinality(credential, &owner, &[network])
            .await?;

        let program = self.program(Operation::Generate, network)?;
        let params = serde_json::to_value(GenerateParams { network, policy })
            .map_err(|e| KeywardError::Validation(e.to_string()))?;

        let outcome = self.executor.run(program, credential, params).await?;
        let generated: GenerateResult = serde_json::from_value(outcome.into_authorized()?)
            .map_err(|e| {
                KeywardError::NetworkDisagreement(format!("malformed generate output: {e}"))
            })?;

        let record = NewWrappedKey {
            owner_identity: owner.clone(),
            public_key: generated.public_key.clone(),
            key_type: network.key_type(),
            network,
            ciphertext: generated.ciphertext,
            data_to_encrypt_hash: generated.data_to_encrypt_hash,
            memo,
        };
        let id = self.store.store(credential, record).await?;

        info!(owner = %owner, id = %id, network = %network, "Generated wrapped key");
        Ok(KeyHandle {
            owner_identity: owner,
            id,
            public_key: generated.public_key,
        })
    }

    /// Import a key that originates outside this system. The one path
    /// where this process transiently holds plaintext: the raw key is
    /// sealed here (no sandbox round trip is needed to produce it) and
    /// zeroized immediately after.
    pub async fn import(
        &self,
        credential: &SessionCredential,
        mut raw_key: String,
        public_key: String,
        key_type: KeyType,
        memo: Option<String>,
    ) -> Result<KeyHandle> {
        let (owner, policy) = self.authorize(credential)?;
        let network = key_type.network();
        network.derive_address(&public_key)?;
        self.enforce_cardinality(credential, &owner, &[network])
            .await?;

        let sealed = envelope::seal(&self.executor, raw_key.as_bytes(), &policy).await;
        raw_key.zeroize();
        let sealed = sealed?;

        let record = NewWrappedKey {
            owner_identity: owner.clone(),
            public_key: public_key.clone(),
            key_type,
            network,
            ciphertext: sealed.ciphertext,
            data_to_encrypt_hash: sealed.data_to_encrypt_hash,
            memo,
        };
        let id = self.store.store(credential, record).await?;

        info!(owner = %owner, id = %id, network = %network, "Imported wrapped key");
        Ok(KeyHandle {
            owner_identity: owner,
            id,
            public_key,
        })
    }

    /// Export the plaintext private key. Unsealing happens inside the
    /// sandbox; the salt prefix is verified and stripped here, turning a
    /// silently corrupted decrypt into an integrity failure.
    pub async fn export(
        &self,
        credential: &SessionCredential,
        id: &str,
        network: KeyNetwork,
    ) -> Result<ExportedKey> {
        let (owner, policy) = self.authorize(credential)?;
        let record = self.fetch_owned(credential, &owner, id, network).await?;

        let program = self.program(Operation::Export, network)?;
        let params = serde_json::to_value(ExportParams {
            network,
            policy,
            ciphertext: record.ciphertext,
            data_to_encrypt_hash: record.data_to_encrypt_hash,
        })
        .map_err(|e| KeywardError::Validation(e.to_string()))?;

        let outcome = self.executor.run(program, credential, params).await?;
        let exported: ExportResult = serde_json::from_value(outcome.into_authorized()?)
            .map_err(|e| {
                KeywardError::NetworkDisagreement(format!("malformed export output: {e}"))
            })?;

        let mut salted = BASE64
            .decode(&exported.decrypted_payload)
            .map_err(|e| KeywardError::Integrity(format!("undecodable export payload: {e}")))?;
        let stripped = envelope::strip_salt(&salted);
        salted.zeroize();
        let decrypted_private_key = String::from_utf8(stripped?)
            .map_err(|_| KeywardError::Integrity("exported key is not valid UTF-8".into()))?;

        debug!(owner = %owner, id = %id, "Exported wrapped key");
        Ok(ExportedKey {
            decrypted_private_key,
            id: record.metadata.id,
            owner_identity: record.metadata.owner_identity,
            public_key: record.metadata.public_key,
            key_type: record.metadata.key_type,
            network: record.metadata.network,
            memo: record.metadata.memo,
        })
    }

    /// Sign a message inside the sandbox. Key material never leaves it.
    pub async fn sign_message(
        &self,
        credential: &SessionCredential,
        id: &str,
        network: KeyNetwork,
        message: &[u8],
    ) -> Result<SignMessageResult> {
        let (owner, policy) = self.authorize(credential)?;
        let record = self.fetch_owned(credential, &owner, id, network).await?;

        let program = self.program(Operation::SignMessage, network)?;
        let params = serde_json::to_value(SignMessageParams {
            network,
            policy,
            ciphertext: record.ciphertext,
            data_to_encrypt_hash: record.data_to_encrypt_hash,
            message: BASE64.encode(message),
        })
        .map_err(|e| KeywardError::Validation(e.to_string()))?;

        let outcome = self.executor.run(program, credential, params).await?;
        serde_json::from_value(outcome.into_authorized()?).map_err(|e| {
            KeywardError::NetworkDisagreement(format!("malformed sign output: {e}"))
        })
    }

    /// Sign (and optionally broadcast) a transaction inside the sandbox.
    pub async fn sign_transaction(
        &self,
        credential: &SessionCredential,
        id: &str,
        network: KeyNetwork,
        unsigned_transaction: serde_json::Value,
        broadcast: bool,
    ) -> Result<SignTransactionResult> {
        let (owner, policy) = self.authorize(credential)?;
        let record = self.fetch_owned(credential, &owner, id, network).await?;

        let program = self.program(Operation::SignTransaction, network)?;
        let params = serde_json::to_value(SignTransactionParams {
            network,
            policy,
            ciphertext: record.ciphertext,
            data_to_encrypt_hash: record.data_to_encrypt_hash,
            unsigned_transaction,
            broadcast,
        })
        .map_err(|e| KeywardError::Validation(e.to_string()))?;

        let outcome = self.executor.run(program, credential, params).await?;
        serde_json::from_value(outcome.into_authorized()?).map_err(|e| {
            KeywardError::NetworkDisagreement(format!("malformed sign output: {e}"))
        })
    }

    /// List metadata for the credential's owner. Empty when the owner
    /// holds no keys.
    pub async fn list_metadata(
        &self,
        credential: &SessionCredential,
    ) -> Result<Vec<WrappedKeyMetadata>> {
        self.authorize(credential)?;
        self.store.list_metadata(credential).await
    }

    /// Fetch one record's metadata (no sealed payload).
    pub async fn get_metadata(
        &self,
        credential: &SessionCredential,
        id: &str,
    ) -> Result<WrappedKeyMetadata> {
        let (owner, _) = self.authorize(credential)?;
        let metadata = self.store.fetch_metadata(credential, id).await?;
        if metadata.owner_identity != owner {
            return Err(KeywardError::Auth(format!(
                "wrapped key {id} is not controlled by owner {owner}"
            )));
        }
        Ok(metadata)
    }

    /// Persist caller-sealed records as one atomic batch.
    pub async fn store_batch(
        &self,
        credential: &SessionCredential,
        records: Vec<NewWrappedKey>,
    ) -> Result<Vec<String>> {
        let (owner, _) = self.authorize(credential)?;
        for record in &records {
            if record.owner_identity != owner {
                return Err(KeywardError::Validation(format!(
                    "batch record for {} does not belong to owner {owner}",
                    record.owner_identity
                )));
            }
        }
        self.store.store_batch(credential, records).await
    }

    /// Replace a record's sealed payload; the prior payload is retained in
    /// the record's version history.
    pub async fn update_sealed_payload(
        &self,
        credential: &SessionCredential,
        id: &str,
        update: UpdateWrappedKey,
    ) -> Result<WrappedKeyRecord> {
        let (owner, _) = self.authorize(credential)?;
        let metadata = self.store.fetch_metadata(credential, id).await?;
        if metadata.owner_identity != owner {
            return Err(KeywardError::Auth(format!(
                "wrapped key {id} is not controlled by owner {owner}"
            )));
        }
        self.store.update(credential, id, update).await
    }

    /// Generate N keys in a single program run (atomic within the run),
    /// then persist them as one store batch. The batch store is a separate
    /// atomicity boundary: if it fails, the computed sealed keys are
    /// discarded and zero records persist.
    pub async fn batch_generate(
        &self,
        credential: &SessionCredential,
        actions: Vec<BatchAction>,
    ) -> Result<Vec<BatchKeyHandle>> {
        if actions.is_empty() {
            return Err(KeywardError::Validation(
                "batch generation requires at least one action".into(),
            ));
        }
        let (owner, policy) = self.authorize(credential)?;
        let networks: Vec<KeyNetwork> = actions.iter().map(|a| a.network).collect();
        self.enforce_cardinality(credential, &owner, &networks)
            .await?;

        let program = self.registry.batch_program().ok_or_else(|| {
            KeywardError::Validation("no vetted batch-generation program registered".into())
        })?;
        let params = serde_json::to_value(BatchGenerateParams {
            policy,
            actions: actions.clone(),
        })
        .map_err(|e| KeywardError::Validation(e.to_string()))?;

        let outcome = self.executor.run(program, credential, params).await?;
        let batch: BatchGenerateResult = serde_json::from_value(outcome.into_authorized()?)
            .map_err(|e| {
                KeywardError::NetworkDisagreement(format!("malformed batch output: {e}"))
            })?;

        if batch.results.len() != actions.len() {
            return Err(KeywardError::NetworkDisagreement(format!(
                "batch returned {} results for {} actions",
                batch.results.len(),
                actions.len()
            )));
        }
        for (action, result) in actions.iter().zip(&batch.results) {
            if action.network != result.network {
                return Err(KeywardError::NetworkDisagreement(
                    "batch results are out of request order".into(),
                ));
            }
        }

        let records: Vec<NewWrappedKey> = batch
            .results
            .iter()
            .map(|r| NewWrappedKey {
                owner_identity: owner.clone(),
                public_key: r.public_key.clone(),
                key_type: r.network.key_type(),
                network: r.network,
                ciphertext: r.ciphertext.clone(),
                data_to_encrypt_hash: r.data_to_encrypt_hash.clone(),
                memo: r.memo.clone(),
            })
            .collect();
        let ids = self.store.store_batch(credential, records).await?;

        info!(owner = %owner, count = ids.len(), "Batch-generated wrapped keys");
        Ok(ids
            .into_iter()
            .zip(batch.results)
            .map(|(id, r)| BatchKeyHandle {
                id,
                network: r.network,
                memo: r.memo,
                public_key: r.public_key,
                signature: r.signature,
            })
            .collect())
    }
}
