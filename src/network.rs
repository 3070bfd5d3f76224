//! Key networks and their native key material formats.
//!
//! The supported networks form a closed capability set: each variant knows
//! how to generate a keypair, derive the canonical address, and sign in
//! its native format. Lifecycle operations select the variant once at the
//! API boundary instead of re-branching on network strings in every
//! component.

use k256::ecdsa::SigningKey as K256SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::{KeywardError, Result};

/// Supported key networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyNetwork {
    Evm,
    Solana,
}

/// Signature algorithm family for a wrapped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    K256,
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl KeyType {
    /// The network a key of this type belongs to.
    pub fn network(&self) -> KeyNetwork {
        match self {
            KeyType::K256 => KeyNetwork::Evm,
            KeyType::Ed25519 => KeyNetwork::Solana,
        }
    }
}

/// Freshly generated key material. The private key is cleared from memory
/// when this value is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct GeneratedKey {
    /// Public key in the network's native encoding.
    #[zeroize(skip)]
    pub public_key: String,
    /// Private key in the network's native encoding (sensitive).
    pub private_key: String,
}

impl KeyNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyNetwork::Evm => "evm",
            KeyNetwork::Solana => "solana",
        }
    }

    /// The signature algorithm used on this network.
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyNetwork::Evm => KeyType::K256,
            KeyNetwork::Solana => KeyType::Ed25519,
        }
    }

    /// Generate a fresh keypair in the network's native format.
    ///
    /// - evm: secp256k1; public key is the uncompressed SEC1 point as
    ///   0x-hex, private key is the 32-byte scalar as 0x-hex.
    /// - solana: ed25519; public key is base58, private key is the
    ///   base58-encoded 64-byte secret-then-public concatenation.
    pub fn generate(&self) -> GeneratedKey {
        match self {
            KeyNetwork::Evm => {
                let signing_key = K256SigningKey::random(&mut OsRng);
                let public = signing_key.verifying_key().to_encoded_point(false);
                GeneratedKey {
                    public_key: format!("0x{}", hex::encode(public.as_bytes())),
                    private_key: format!("0x{}", hex::encode(signing_key.to_bytes())),
                }
            }
            KeyNetwork::Solana => {
                let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
                let verifying_key = signing_key.verifying_key();
                let mut keypair = [0u8; 64];
                keypair[..32].copy_from_slice(&signing_key.to_bytes());
                keypair[32..].copy_from_slice(&verifying_key.to_bytes());
                let generated = GeneratedKey {
                    public_key: bs58::encode(verifying_key.to_bytes()).into_string(),
                    private_key: bs58::encode(keypair).into_string(),
                };
                keypair.zeroize();
                generated
            }
        }
    }

    /// Derive the canonical address for a public key on this network.
    ///
    /// - evm: Keccak-256 of the uncompressed point body, last 20 bytes.
    /// - solana: the base58 public key is the address.
    pub fn derive_address(&self, public_key: &str) -> Result<String> {
        match self {
            KeyNetwork::Evm => {
                let stripped = public_key.strip_prefix("0x").unwrap_or(public_key);
                let bytes = hex::decode(stripped).map_err(|e| {
                    KeywardError::Validation(format!("malformed evm public key: {e}"))
                })?;
                if bytes.len() != 65 || bytes[0] != 0x04 {
                    return Err(KeywardError::Validation(
                        "evm public key must be an uncompressed SEC1 point".into(),
                    ));
                }
                let digest = Keccak256::digest(&bytes[1..]);
                Ok(format!("0x{}", hex::encode(&digest.as_slice()[12..])))
            }
            KeyNetwork::Solana => {
                let decoded = bs58::decode(public_key).into_vec().map_err(|e| {
                    KeywardError::Validation(format!("malformed solana public key: {e}"))
                })?;
                if decoded.len() != 32 {
                    return Err(KeywardError::Validation(
                        "solana public key must be 32 bytes".into(),
                    ));
                }
                Ok(public_key.to_string())
            }
        }
    }

    /// Sign a message with a private key in this network's native format.
    ///
    /// Only ever called inside the sandbox programs; it lives here so the
    /// capability set stays closed and testable.
    pub fn sign(&self, private_key: &str, message: &[u8]) -> Result<String> {
        match self {
            KeyNetwork::Evm => {
                let stripped = private_key.strip_prefix("0x").unwrap_or(private_key);
                let mut scalar = hex::decode(stripped).map_err(|e| {
                    KeywardError::Validation(format!("malformed evm private key: {e}"))
                })?;
                let signing_key = K256SigningKey::from_slice(&scalar).map_err(|e| {
                    KeywardError::Validation(format!("invalid evm private key: {e}"))
                })?;
                scalar.zeroize();

                let prehash = Keccak256::digest(message);
                let (signature, recovery_id) = signing_key
                    .sign_prehash_recoverable(prehash.as_slice())
                    .map_err(|e| KeywardError::Validation(format!("evm signing failed: {e}")))?;

                let mut out = signature.to_bytes().to_vec();
                out.push(recovery_id.to_byte() + 27);
                Ok(format!("0x{}", hex::encode(out)))
            }
            KeyNetwork::Solana => {
                let mut decoded = bs58::decode(private_key).into_vec().map_err(|e| {
                    KeywardError::Validation(format!("malformed solana private key: {e}"))
                })?;
                if decoded.len() != 64 {
                    decoded.zeroize();
                    return Err(KeywardError::Validation(
                        "solana private key must be a 64-byte keypair".into(),
                    ));
                }
                let mut secret = [0u8; 32];
                secret.copy_from_slice(&decoded[..32]);
                decoded.zeroize();

                let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
                secret.zeroize();

                use ed25519_dalek::Signer;
                let signature = signing_key.sign(message);
                Ok(bs58::encode(signature.to_bytes()).into_string())
            }
        }
    }
}

impl std::fmt::Display for KeyNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
