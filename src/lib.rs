//! Keyward - custodial wrapped-key lifecycle client
//!
//! Keyward lets a chain-owned identity generate, import, export, and use a
//! private key without this client ever durably holding the plaintext.
//! Keys are sealed under an owner-bound access policy and only unsealed
//! inside a distributed secure-execution network, which re-verifies the
//! caller's session credential and re-evaluates the policy before any node
//! touches key material.
//!
//! ## Components
//!
//! - **session**: validates session credentials and resolves the owner
//!   identity from their delegation proof
//! - **policy**: builds the owner-equality access policy sealed alongside
//!   each key
//! - **network**: the closed set of supported key networks (evm, solana)
//!   with their native key formats
//! - **envelope**: the salt-prefix integrity convention around sealing
//! - **execution**: client for the secure execution gateway and its vetted
//!   programs (generate / sign / export / batch)
//! - **store**: REST client for the wrapped-key metadata service with
//!   all-or-nothing batch semantics
//! - **lifecycle**: the public generate/import/export/sign/list operations
//!   composing the above

pub mod config;
pub mod envelope;
pub mod execution;
pub mod lifecycle;
pub mod network;
pub mod policy;
pub mod session;
pub mod store;
pub mod types;

pub use config::{KeywardConfig, Operation, OwnerCardinality, ProgramRegistry};
pub use lifecycle::KeyLifecycle;
pub use network::{KeyNetwork, KeyType};
pub use types::{ErrorKind, KeywardError, Result};
