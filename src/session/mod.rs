//! Session credential validation and owner resolution.
//!
//! A session credential is a time-bounded bundle of per-node authorization
//! entries issued by an external flow and consumed read-only here. Each
//! entry wraps a signed payload; an owner-backed credential additionally
//! carries a delegation proof binding the session key to the owner
//! identity via a distinct threshold-signature algorithm tag.
//!
//! Everything in this module is pure parsing. No network calls, no side
//! effects: failures raised here happen before any store or compute call.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::validate_evm_address;
use crate::types::{KeywardError, Result};

/// Algorithm tag marking a delegation proof produced by the owner
/// identity's collective (threshold) authority. Entries signed by a plain
/// single-party session key carry no tag.
pub const THRESHOLD_ALGO_TAG: &str = "BLS_THRESHOLD";

/// A session credential: one authorization entry per execution node.
///
/// Entries are keyed by node URL in a BTreeMap so representative
/// selection is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCredential {
    pub entries: BTreeMap<String, AuthEntry>,
}

/// One node's authorization entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthEntry {
    /// Signature over the signed message.
    pub sig: String,
    /// How the signing key was derived (issuance detail, opaque here).
    pub derived_via: String,
    /// The signed payload, JSON-encoded (see [`SessionPayload`]).
    pub signed_message: String,
    /// Address of the session key that signed this entry.
    pub address: String,
    /// Signature algorithm tag, when not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
}

/// Parsed form of an entry's signed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Wall-clock expiration, independently enforced by every node.
    pub expiration: DateTime<Utc>,
    /// When the credential was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    /// Delegation proofs embedded at issuance.
    #[serde(default)]
    pub capabilities: Vec<DelegationProof>,
}

/// A capability embedded in the signed payload. The proof that matters
/// here is the one tagged with [`THRESHOLD_ALGO_TAG`]: its address is the
/// owner identity the session is permitted to act for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationProof {
    pub sig: String,
    pub derived_via: String,
    pub signed_message: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
}

/// Pick one entry to parse on behalf of the whole set. All entries of a
/// well-formed credential agree on payload content.
pub fn select_representative(credential: &SessionCredential) -> Result<&AuthEntry> {
    credential
        .entries
        .values()
        .next()
        .ok_or_else(|| KeywardError::Auth("session credential contains no entries".into()))
}

/// Parse an entry's signed payload.
pub fn parse_payload(entry: &AuthEntry) -> Result<SessionPayload> {
    serde_json::from_str(&entry.signed_message)
        .map_err(|e| KeywardError::Auth(format!("malformed session payload: {e}")))
}

/// Resolve the owner identity an entry is permitted to act for.
///
/// Fails with a distinct "not owner-backed" error when no threshold-tagged
/// delegation proof is present, which is how a plain single-party
/// credential is told apart from one backed by the owner's collective
/// authority.
pub fn resolve_owner(entry: &AuthEntry) -> Result<String> {
    let payload = parse_payload(entry)?;
    let proof = payload
        .capabilities
        .iter()
        .find(|cap| cap.algo.as_deref() == Some(THRESHOLD_ALGO_TAG))
        .ok_or_else(|| KeywardError::Auth("credential is not owner-backed".into()))?;

    validate_evm_address(&proof.address)
        .map_err(|_| KeywardError::Auth(format!("delegation proof carries malformed owner address {:?}", proof.address)))?;
    Ok(proof.address.clone())
}

/// Reject expired credentials and credentials requesting a lifetime beyond
/// the configured maximum. Runs locally before any remote call; every
/// remote node re-checks the expiration independently.
pub fn validate_lifetime(entry: &AuthEntry, max_lifetime: Duration, now: DateTime<Utc>) -> Result<()> {
    let payload = parse_payload(entry)?;

    if payload.expiration <= now {
        return Err(KeywardError::Auth(format!(
            "session credential expired at {}",
            payload.expiration.to_rfc3339()
        )));
    }

    let lifetime_start = payload.issued_at.unwrap_or(now);
    let requested = payload
        .expiration
        .signed_duration_since(lifetime_start)
        .to_std()
        .unwrap_or_default();
    if requested > max_lifetime {
        return Err(KeywardError::Auth(format!(
            "requested credential lifetime {}s exceeds maximum {}s",
            requested.as_secs(),
            max_lifetime.as_secs()
        )));
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_empty_credential_rejected() {
        let credential = SessionCredential {
            entries: BTreeMap::new(),
        };
        let err = select_representative(&credential).unwrap_err();
        assert!(matches!(err, KeywardError::Auth(_)));
    }

    #[test]
    fn test_resolve_owner_from_delegation_proof() {
        let credential = owner_credential(TEST_OWNER, Duration::from_secs(3600));
        let entry = select_representative(&credential).unwrap();
        assert_eq!(resolve_owner(entry).unwrap(), TEST_OWNER);
    }

    #[test]
    fn test_plain_credential_is_not_owner_backed() {
        let credential = plain_credential(Duration::from_secs(3600));
        let entry = select_representative(&credential).unwrap();
        let err = resolve_owner(entry).unwrap_err();
        assert!(err.to_string().contains("not owner-backed"));
    }

    #[test]
    fn test_expired_credential_rejected() {
        let credential = credential_with_payload(SessionPayload {
            expiration: Utc::now() - chrono::Duration::minutes(5),
            issued_at: None,
            capabilities: vec![],
        });
        let entry = select_representative(&credential).unwrap();
        let err = validate_lifetime(entry, Duration::from_secs(3600), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_overlong_lifetime_rejected() {
        let credential = owner_credential(TEST_OWNER, Duration::from_secs(30 * 24 * 3600));
        let entry = select_representative(&credential).unwrap();
        let err =
            validate_lifetime(entry, Duration::from_secs(7 * 24 * 3600), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_lifetime_within_bounds_accepted() {
        let credential = owner_credential(TEST_OWNER, Duration::from_secs(3600));
        let entry = select_representative(&credential).unwrap();
        validate_lifetime(entry, Duration::from_secs(7 * 24 * 3600), Utc::now()).unwrap();
    }

    #[test]
    fn test_malformed_payload_is_auth_failure() {
        let mut credential = owner_credential(TEST_OWNER, Duration::from_secs(3600));
        credential
            .entries
            .values_mut()
            .for_each(|e| e.signed_message = "not json".into());
        let entry = select_representative(&credential).unwrap();
        assert!(matches!(
            resolve_owner(entry).unwrap_err(),
            KeywardError::Auth(_)
        ));
    }
}
