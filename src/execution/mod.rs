//! Secure execution gateway client.
//!
//! The gateway is the boundary into the external distributed network that
//! runs vetted programs over sealed key material. Every node independently
//! re-verifies the session credential and re-evaluates the access policy
//! before touching ciphertext; client-side trust is never sufficient.
//! Plaintext is reconstructed in at most one node's memory and returned to
//! the caller only by the export program.
//!
//! ## Denial classification
//!
//! A node that refuses a caller historically produces no output at all,
//! which is indistinguishable from "not computed yet". The client
//! therefore classifies replies into a tri-state: authorized completion
//! (well-formed payload plus explicit success flag), explicit denial (the
//! program emitted the denial sentinel), and silent denial (empty output).
//! Both denial shapes surface as [`crate::types::KeywardError::PolicyDenied`]; an
//! empty reply is never treated as success.

pub mod programs;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{KeywardConfig, ProgramId};
use crate::policy::AccessPolicy;
use crate::session::SessionCredential;
use crate::types::{KeywardError, Result};

/// Marker prefixing textual error replies from the execution network.
pub const REMOTE_ERROR_MARKER: &str = "[EXEC_ERROR]";

/// Sentinel JSON object emitted by vetted programs on explicit policy
/// denial: `{"denied": true}`.
pub const DENIAL_FIELD: &str = "denied";

/// Outcome of one program run, after client-side classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Explicit success flag and a well-formed non-empty payload.
    Completed(Value),
    /// Policy denied the caller. `explicit` distinguishes the denial
    /// sentinel from a silent empty reply.
    Denied { explicit: bool },
}

impl ExecutionOutcome {
    /// Unwrap the authorized payload, converting either denial shape into
    /// a policy error.
    pub fn into_authorized(self) -> Result<Value> {
        match self {
            ExecutionOutcome::Completed(value) => Ok(value),
            ExecutionOutcome::Denied { explicit: true } => Err(KeywardError::PolicyDenied(
                "execution program reported an explicit policy denial".into(),
            )),
            ExecutionOutcome::Denied { explicit: false } => Err(KeywardError::PolicyDenied(
                "execution network returned no output; treating silent exit as denial".into(),
            )),
        }
    }
}

/// Boundary into the secure execution network.
///
/// `seal` is the public threshold-encrypt primitive (no credential: anyone
/// may seal under a policy); `run` executes one vetted program under a
/// session credential.
#[async_trait]
pub trait SecureExecutor: Send + Sync {
    /// Threshold-encrypt `data` under `policy`; returns base64 ciphertext.
    async fn seal(&self, data: &[u8], policy: &AccessPolicy) -> Result<String>;

    /// Run one vetted program. A single attempt; failures are typed, never
    /// retried.
    async fn run(
        &self,
        program: &ProgramId,
        credential: &SessionCredential,
        params: Value,
    ) -> Result<ExecutionOutcome>;
}

/// Invocation request wire body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationRequest<'a> {
    program_id: &'a str,
    session_credential: &'a SessionCredential,
    params: &'a Value,
}

/// Invocation reply wire body: `response` is either the program's opaque
/// output or a marker-prefixed error string.
#[derive(Debug, Deserialize)]
struct InvocationReply {
    success: bool,
    #[serde(default)]
    response: String,
}

/// Classify a raw invocation reply into an outcome or a typed failure.
fn classify_reply(reply: InvocationReply) -> Result<ExecutionOutcome> {
    if !reply.success {
        // Insufficient node agreement; the remote text goes through verbatim.
        return Err(KeywardError::NetworkDisagreement(reply.response));
    }

    let trimmed = reply.response.trim();
    if trimmed.is_empty() {
        return Ok(ExecutionOutcome::Denied { explicit: false });
    }
    if trimmed.starts_with(REMOTE_ERROR_MARKER) {
        return Err(KeywardError::NetworkDisagreement(reply.response));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|_| {
        KeywardError::NetworkDisagreement(format!("malformed program output: {trimmed}"))
    })?;

    if value.get(DENIAL_FIELD).and_then(Value::as_bool) == Some(true) {
        return Ok(ExecutionOutcome::Denied { explicit: true });
    }

    Ok(ExecutionOutcome::Completed(value))
}

/// HTTP client for the secure execution gateway.
pub struct ExecutionClient {
    http: reqwest::Client,
    gateway_url: String,
}

impl ExecutionClient {
    pub fn new(config: &KeywardConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("keyward/0.1")
            .build()
            .unwrap_or_default();
        Self {
            http,
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SecureExecutor for ExecutionClient {
    async fn seal(&self, data: &[u8], policy: &AccessPolicy) -> Result<String> {
        let url = format!("{}/seal", self.gateway_url);
        debug!(url = %url, bytes = data.len(), "Sealing payload under owner policy");

        let body = serde_json::json!({
            "dataToSeal": BASE64.encode(data),
            "policy": policy,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(KeywardError::from_transport)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(KeywardError::from_transport)?;
        if !(200..300).contains(&status) {
            warn!(status, "Seal primitive rejected the request");
            return Err(KeywardError::from_response(status, &text));
        }

        #[derive(Deserialize)]
        struct SealReply {
            ciphertext: String,
        }
        let reply: SealReply = serde_json::from_str(&text).map_err(|e| {
            KeywardError::NetworkDisagreement(format!("malformed seal reply: {e}"))
        })?;
        Ok(reply.ciphertext)
    }

    async fn run(
        &self,
        program: &ProgramId,
        credential: &SessionCredential,
        params: Value,
    ) -> Result<ExecutionOutcome> {
        let url = format!("{}/execute", self.gateway_url);
        debug!(url = %url, program = %program.as_str(), "Invoking vetted program");

        let request = InvocationRequest {
            program_id: program.as_str(),
            session_credential: credential,
            params: &params,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(KeywardError::from_transport)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(KeywardError::from_transport)?;
        if !(200..300).contains(&status) {
            warn!(status, program = %program.as_str(), "Gateway rejected invocation");
            return Err(KeywardError::from_response(status, &text));
        }

        let reply: InvocationReply = serde_json::from_str(&text).map_err(|e| {
            KeywardError::NetworkDisagreement(format!("malformed invocation reply: {e}"))
        })?;
        classify_reply(reply)
    }
}
