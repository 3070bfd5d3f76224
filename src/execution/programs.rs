//! Parameter and result types for the vetted execution programs.
//!
//! These are the wire bodies exchanged with the secure execution network.
//! Plaintext key material appears only in [`ExportResult`]; every other
//! program computes over the unsealed key inside the sandbox and returns
//! derived output only.

use serde::{Deserialize, Serialize};

use crate::network::KeyNetwork;
use crate::policy::AccessPolicy;

/// Params for the `generate` program: key material is created inside the
/// sandbox, sealed under the policy, and never leaves in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParams {
    pub network: KeyNetwork,
    pub policy: AccessPolicy,
}

/// Output of the `generate` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    pub public_key: String,
}

/// Params for the `signMessage` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageParams {
    pub network: KeyNetwork,
    pub policy: AccessPolicy,
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    /// Message bytes, base64.
    pub message: String,
}

/// Output of the `signMessage` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageResult {
    pub signature: String,
}

/// Params for the `signTransaction` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionParams {
    pub network: KeyNetwork,
    pub policy: AccessPolicy,
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    /// Chain-specific unsigned transaction, passed through opaquely.
    pub unsigned_transaction: serde_json::Value,
    /// Broadcast via the sandbox-provided RPC capability after signing.
    pub broadcast: bool,
}

/// Output of the `signTransaction` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_transaction: Option<String>,
    /// Present only when the program broadcast the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Params for the `export` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub network: KeyNetwork,
    pub policy: AccessPolicy,
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
}

/// Output of the `export` program: the one path that deliberately returns
/// decrypted material to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    /// Decrypted payload, base64, still carrying the salt prefix. The
    /// caller validates and strips the prefix; a missing prefix means the
    /// threshold decrypt silently produced garbage.
    pub decrypted_payload: String,
}

/// One requested action within a batch generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAction {
    pub network: KeyNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Optional message (base64) to sign with the freshly minted key,
    /// inside the same program run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_message: Option<String>,
}

/// Params for the `batchGenerate` program: N keys in one invocation,
/// atomically within a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGenerateParams {
    pub policy: AccessPolicy,
    pub actions: Vec<BatchAction>,
}

/// One generated key within a batch result. Results are returned in the
/// caller-specified action order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGeneratedKey {
    pub network: KeyNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    pub public_key: String,
    /// Signature over the action's `sign_message`, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Output of the `batchGenerate` program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGenerateResult {
    pub results: Vec<BatchGeneratedKey>,
}
