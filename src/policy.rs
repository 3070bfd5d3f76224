//! Owner-bound access policies.
//!
//! A policy is the decryption precondition sealed alongside a wrapped key:
//! an on-chain address equality predicate that only the owner identity
//! satisfies. Policies are built per call and travel with the sealed
//! payload; they are never persisted standalone.

use serde::{Deserialize, Serialize};

use crate::types::{KeywardError, Result};

/// Chain the policy predicate is evaluated against.
pub const POLICY_CHAIN: &str = "ethereum";

/// Parameter placeholder substituted with the caller's address by the
/// execution network during policy evaluation.
pub const CALLER_ADDRESS_PARAM: &str = ":callerAddress";

/// Equality predicate binding a sealed payload to one owner identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub chain: String,
    pub parameters: Vec<String>,
    pub comparator: String,
    pub value: String,
}

impl AccessPolicy {
    /// Build the owner-equality policy for a well-formed owner address.
    pub fn for_owner(owner_address: &str) -> Result<AccessPolicy> {
        validate_evm_address(owner_address)?;
        Ok(AccessPolicy {
            chain: POLICY_CHAIN.to_string(),
            parameters: vec![CALLER_ADDRESS_PARAM.to_string()],
            comparator: "=".to_string(),
            value: owner_address.to_string(),
        })
    }
}

/// Validate a 0x-prefixed 20-byte hex chain address.
pub fn validate_evm_address(address: &str) -> Result<()> {
    let hex_part = address.strip_prefix("0x").ok_or_else(|| {
        KeywardError::Validation(format!("address {address:?} is missing the 0x prefix"))
    })?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KeywardError::Validation(format!(
            "address {address:?} is not a 20-byte hex address"
        )));
    }
    Ok(())
}
