//! SecureChannel — authenticated encryption of model updates
//!
//! AES-256-GCM over the canonical JSON form of a ModelWeights, with an
//! independent SHA-256 integrity hash computed over the plaintext before
//! encryption. The hash lets a receiver re-check an already-decrypted
//! payload against what the sender saw, on top of the AEAD tag. Every
//! encryption draws a fresh random 96-bit nonce; nonce reuse under one
//! key is the one invariant this module must never break.

use crate::error::FederatedError;
use crate::model::weights::ModelWeights;
use crate::secure::key::{KeyConfig, KeyMaterial, ALGORITHM};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// AES-GCM nonce size in raw bytes
pub const NONCE_LEN: usize = 12;

/// The wire envelope. Field names are the transport contract; a package
/// is immutable once created and either decrypts to the exact original
/// weights or fails outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurePackage {
    /// Base64 of the authenticated ciphertext (tag included)
    pub ciphertext: String,
    /// Base64 of the 12-byte nonce
    pub nonce: String,
    /// Hex SHA-256 of the canonical plaintext JSON, computed pre-encryption
    #[serde(rename = "hash")]
    pub integrity_hash: String,
    pub algorithm: String,
    #[serde(rename = "kdf")]
    pub kdf_descriptor: String,
    /// Caller-supplied, carried unencrypted for routing and logging only;
    /// never trusted for security decisions
    pub timestamp: String,
}

/// Encrypts and decrypts ModelWeights payloads under one resolved key.
/// Key derivation is paid once here, never on the encrypt/decrypt path.
pub struct SecureChannel {
    cipher: Aes256Gcm,
    kdf_descriptor: &'static str,
}

impl SecureChannel {
    pub fn new(config: &KeyConfig) -> Result<Self, FederatedError> {
        let key = KeyMaterial::resolve(config)?;
        let cipher = Aes256Gcm::new_from_slice(key.key_bytes())
            .map_err(|e| FederatedError::Configuration(format!("Cipher init: {}", e)))?;
        Ok(Self {
            cipher,
            kdf_descriptor: key.kdf_descriptor(),
        })
    }

    /// Resolve key material from the process environment
    pub fn from_env() -> Result<Self, FederatedError> {
        Self::new(&KeyConfig::from_env()?)
    }

    /// Serialize canonically, hash, then encrypt under a fresh nonce.
    /// Two calls with the same weights produce different ciphertexts that
    /// both decrypt back to identical content.
    pub fn encrypt(&self, weights: &ModelWeights) -> Result<SecurePackage, FederatedError> {
        let canonical = weights.canonical_json()?;
        let integrity_hash = weights.content_hash()?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, canonical.as_bytes())
            .map_err(|_| FederatedError::Encoding("AES-GCM encryption failed".into()))?;

        Ok(SecurePackage {
            ciphertext: BASE64.encode(&ciphertext),
            nonce: BASE64.encode(nonce),
            integrity_hash,
            algorithm: ALGORITHM.to_string(),
            kdf_descriptor: self.kdf_descriptor.to_string(),
            timestamp: weights.produced_at.to_rfc3339(),
        })
    }

    /// Authenticated decryption. Yields the exact original weights or an
    /// error; there is no partial result. The failure message names no
    /// plaintext and no key material.
    pub fn decrypt(&self, package: &SecurePackage) -> Result<ModelWeights, FederatedError> {
        let ciphertext = BASE64
            .decode(&package.ciphertext)
            .map_err(|e| FederatedError::Encoding(format!("Ciphertext base64: {}", e)))?;
        let nonce_bytes = BASE64
            .decode(&package.nonce)
            .map_err(|e| FederatedError::Encoding(format!("Nonce base64: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(FederatedError::Encoding(format!(
                "Nonce must be {} bytes, got {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| {
                FederatedError::Integrity(
                    "AEAD authentication failed (wrong key, tampering, or corruption)".into(),
                )
            })?;

        let weights: ModelWeights = serde_json::from_slice(&plaintext).map_err(|_| {
            FederatedError::Validation("Decrypted payload is not a valid ModelWeights".into())
        })?;
        weights.validate_shape()?;
        Ok(weights)
    }

    /// Recompute the canonical hash and compare in constant time.
    /// A mismatch is a boolean signal, never an error — callers own the
    /// reject-vs-log policy.
    pub fn verify_integrity(&self, weights: &ModelWeights, expected_hash: &str) -> bool {
        match weights.content_hash() {
            Ok(actual) => constant_time_compare(&actual, expected_hash),
            Err(_) => false,
        }
    }

    /// Sender-side composition: hash the plaintext, then encrypt.
    pub fn create_secure_package(
        &self,
        weights: &ModelWeights,
    ) -> Result<SecurePackage, FederatedError> {
        self.encrypt(weights)
    }
}

/// Constant-time string comparison to keep hash checks timing-safe
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
