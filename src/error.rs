//! Crate-wide error taxonomy
//!
//! Three failure classes matter here:
//! - configuration: no usable key material at startup
//! - integrity: AEAD authentication failure on decrypt
//! - validation: structurally invalid weights in a batch or decode
//!
//! Integrity messages carry no plaintext or key bytes. None of these are
//! recovered locally; retry policy belongs to the caller.

#[derive(Debug, thiserror::Error)]
pub enum FederatedError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Integrity verification failed: {0}")]
    Integrity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl FederatedError {
    /// True for failures that mean the ciphertext or its key is bad,
    /// as opposed to a malformed but honest submission.
    pub fn is_integrity(&self) -> bool {
        matches!(self, FederatedError::Integrity(_))
    }
}
