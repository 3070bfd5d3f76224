//! Configuration for keyward services.
//!
//! Holds endpoint configuration, the credential lifetime ceiling, the
//! per-owner cardinality policy, and the registry of vetted execution
//! programs. The registry is an immutable value constructed once and
//! passed by reference into the lifecycle service; there is no
//! process-global program table.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::network::KeyNetwork;

/// Lifecycle operations that run inside the secure execution network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Generate,
    SignMessage,
    SignTransaction,
    Export,
    BatchGenerate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Generate => "generate",
            Operation::SignMessage => "signMessage",
            Operation::SignTransaction => "signTransaction",
            Operation::Export => "export",
            Operation::BatchGenerate => "batchGenerate",
        }
    }
}

/// How many wrapped keys one owner identity may hold.
///
/// Legacy import flows enforced a single key per owner while batch
/// generation mints one key per network under the same owner. The policy
/// is an explicit choice here, enforced as a client pre-flight; the
/// backend's uniqueness checks remain authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerCardinality {
    /// At most one wrapped key per owner identity.
    SinglePerOwner,
    /// At most one wrapped key per owner identity per network.
    #[default]
    PerOwnerPerNetwork,
    /// No client-side ceiling.
    Unbounded,
}

/// Content-addressed identifier of a vetted execution program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramId(pub String);

impl ProgramId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Immutable registry of vetted programs, keyed by operation and network.
///
/// Batch generation is network-agnostic (one program handles every action
/// list), so it is keyed under a single network-independent slot.
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    programs: BTreeMap<(Operation, Option<KeyNetwork>), ProgramId>,
}

impl ProgramRegistry {
    /// The default vetted program set.
    pub fn vetted() -> Self {
        let mut programs = BTreeMap::new();
        let mut insert = |op: Operation, net: Option<KeyNetwork>, cid: &str| {
            programs.insert((op, net), ProgramId(cid.to_string()));
        };

        insert(
            Operation::Generate,
            Some(KeyNetwork::Evm),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDy7gen1",
        );
        insert(
            Operation::Generate,
            Some(KeyNetwork::Solana),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDy7gen2",
        );
        insert(
            Operation::SignMessage,
            Some(KeyNetwork::Evm),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDysgm1",
        );
        insert(
            Operation::SignMessage,
            Some(KeyNetwork::Solana),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDysgm2",
        );
        insert(
            Operation::SignTransaction,
            Some(KeyNetwork::Evm),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDysgt1",
        );
        insert(
            Operation::SignTransaction,
            Some(KeyNetwork::Solana),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDysgt2",
        );
        insert(
            Operation::Export,
            Some(KeyNetwork::Evm),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDyexp1",
        );
        insert(
            Operation::Export,
            Some(KeyNetwork::Solana),
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDyexp2",
        );
        insert(
            Operation::BatchGenerate,
            None,
            "QmYx3bYJvBBXAgNqSCbM1bXmSt5Mb2HyLm3QgQ9wDybat1",
        );

        Self { programs }
    }

    /// Return a copy of this registry with one program replaced.
    ///
    /// The registry itself is never mutated in place; overrides produce a
    /// new value that the caller injects where needed.
    pub fn with_program(
        mut self,
        op: Operation,
        network: Option<KeyNetwork>,
        program: ProgramId,
    ) -> Self {
        self.programs.insert((op, network), program);
        self
    }

    /// Look up the program for a network-scoped operation.
    pub fn program_for(&self, op: Operation, network: KeyNetwork) -> Option<&ProgramId> {
        self.programs.get(&(op, Some(network)))
    }

    /// Look up the network-independent batch-generation program.
    pub fn batch_program(&self) -> Option<&ProgramId> {
        self.programs.get(&(Operation::BatchGenerate, None))
    }
}

/// Configuration for the lifecycle service and its clients.
#[derive(Debug, Clone)]
pub struct KeywardConfig {
    /// Base URL of the wrapped-key store service.
    pub store_url: String,

    /// Base URL of the secure execution gateway.
    pub gateway_url: String,

    /// Backend routing version placed in the store routing header.
    pub backend_version: String,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// Maximum lifetime a session credential may request. Credentials
    /// expiring further out are rejected before any store or compute call.
    pub max_credential_lifetime: Duration,

    /// Per-owner key cardinality policy.
    pub cardinality: OwnerCardinality,
}

impl Default for KeywardConfig {
    fn default() -> Self {
        Self {
            store_url: "https://store.keyward.local".to_string(),
            gateway_url: "https://gateway.keyward.local".to_string(),
            backend_version: "v1".to_string(),
            request_timeout: Duration::from_secs(30),
            max_credential_lifetime: Duration::from_secs(7 * 24 * 3600),
            cardinality: OwnerCardinality::default(),
        }
    }
}
