//! Secure transport envelope: key resolution and authenticated encryption

pub mod channel;
pub mod key;

pub use channel::{SecureChannel, SecurePackage, NONCE_LEN};
pub use key::{KeyConfig, KeyMaterial, ALGORITHM, KDF_DIRECT, KDF_PBKDF2, PBKDF2_ITERATIONS};
