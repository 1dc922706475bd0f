//! Key material resolution — direct key or PBKDF2 derivation
//!
//! Two mutually exclusive configuration paths produce the 256-bit AES key:
//! a pre-derived 32-byte key (base64), or a master secret plus a hex salt
//! of at least 16 bytes run through PBKDF2-HMAC-SHA256 at 100k iterations.
//! Resolution happens once, at construction; a missing or malformed
//! configuration fails immediately rather than at first encrypt.

use crate::error::FederatedError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

pub const KEY_LEN: usize = 32;
pub const MIN_SALT_LEN: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Cipher tag carried in every SecurePackage
pub const ALGORITHM: &str = "AES-GCM-256";
/// KDF tag for the derived-key path
pub const KDF_PBKDF2: &str = "PBKDF2-SHA256-100k";
/// KDF tag for a pre-provisioned key
pub const KDF_DIRECT: &str = "direct-key";

/// Environment variable holding a pre-derived base64 key (takes precedence)
pub const ENV_AES_KEY: &str = "FEDERATED_AES_KEY";
pub const ENV_MASTER_SECRET: &str = "FEDERATED_MASTER_SECRET";
pub const ENV_SALT: &str = "FEDERATED_SALT";

/// How the symmetric key is supplied
#[derive(Debug, Clone)]
pub enum KeyConfig {
    /// Pre-derived 32-byte key, base64-encoded
    Direct { key_b64: String },
    /// Master secret + hex salt, run through PBKDF2
    Derived {
        master_secret: String,
        salt_hex: String,
    },
}

impl KeyConfig {
    /// Read the key configuration from the process environment.
    /// A direct key wins over the secret/salt pair when both are set.
    pub fn from_env() -> Result<Self, FederatedError> {
        if let Ok(key_b64) = std::env::var(ENV_AES_KEY) {
            return Ok(KeyConfig::Direct { key_b64 });
        }
        let master_secret = std::env::var(ENV_MASTER_SECRET).map_err(|_| {
            FederatedError::Configuration(format!(
                "Neither {} nor {} is set",
                ENV_AES_KEY, ENV_MASTER_SECRET
            ))
        })?;
        let salt_hex = std::env::var(ENV_SALT).map_err(|_| {
            FederatedError::Configuration(format!("{} is required with {}", ENV_SALT, ENV_MASTER_SECRET))
        })?;
        Ok(KeyConfig::Derived {
            master_secret,
            salt_hex,
        })
    }
}

/// A resolved 256-bit symmetric key
#[derive(Debug)]
pub struct KeyMaterial {
    key: [u8; KEY_LEN],
    kdf_descriptor: &'static str,
}

impl KeyMaterial {
    pub fn resolve(config: &KeyConfig) -> Result<Self, FederatedError> {
        match config {
            KeyConfig::Direct { key_b64 } => {
                let bytes = BASE64.decode(key_b64).map_err(|e| {
                    FederatedError::Configuration(format!("Invalid base64 key: {}", e))
                })?;
                if bytes.len() != KEY_LEN {
                    return Err(FederatedError::Configuration(format!(
                        "Direct key must be {} bytes, got {}",
                        KEY_LEN,
                        bytes.len()
                    )));
                }
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                Ok(Self {
                    key,
                    kdf_descriptor: KDF_DIRECT,
                })
            }
            KeyConfig::Derived {
                master_secret,
                salt_hex,
            } => {
                let salt = hex::decode(salt_hex).map_err(|e| {
                    FederatedError::Configuration(format!("Invalid hex salt: {}", e))
                })?;
                if salt.len() < MIN_SALT_LEN {
                    return Err(FederatedError::Configuration(format!(
                        "Salt must be at least {} bytes, got {}",
                        MIN_SALT_LEN,
                        salt.len()
                    )));
                }
                let mut key = [0u8; KEY_LEN];
                pbkdf2_hmac::<Sha256>(
                    master_secret.as_bytes(),
                    &salt,
                    PBKDF2_ITERATIONS,
                    &mut key,
                );
                Ok(Self {
                    key,
                    kdf_descriptor: KDF_PBKDF2,
                })
            }
        }
    }

    pub fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn kdf_descriptor(&self) -> &'static str {
        self.kdf_descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64_key(byte: u8) -> String {
        BASE64.encode([byte; KEY_LEN])
    }

    #[test]
    fn test_direct_key_used_verbatim() {
        let config = KeyConfig::Direct { key_b64: b64_key(7) };
        let key = KeyMaterial::resolve(&config).unwrap();
        assert_eq!(key.key_bytes(), &[7u8; KEY_LEN]);
        assert_eq!(key.kdf_descriptor(), KDF_DIRECT);
    }

    #[test]
    fn test_direct_key_wrong_length_rejected() {
        let config = KeyConfig::Direct {
            key_b64: BASE64.encode([1u8; 16]),
        };
        let err = KeyMaterial::resolve(&config).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn test_direct_key_bad_base64_rejected() {
        let config = KeyConfig::Direct {
            key_b64: "!!not base64!!".into(),
        };
        assert!(KeyMaterial::resolve(&config).is_err());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let config = KeyConfig::Derived {
            master_secret: "test-secret".into(),
            salt_hex: "a".repeat(32),
        };
        let a = KeyMaterial::resolve(&config).unwrap();
        let b = KeyMaterial::resolve(&config).unwrap();
        assert_eq!(a.key_bytes(), b.key_bytes());
        assert_eq!(a.kdf_descriptor(), KDF_PBKDF2);
    }

    #[test]
    fn test_different_salt_different_key() {
        let a = KeyMaterial::resolve(&KeyConfig::Derived {
            master_secret: "test-secret".into(),
            salt_hex: "a".repeat(32),
        })
        .unwrap();
        let b = KeyMaterial::resolve(&KeyConfig::Derived {
            master_secret: "test-secret".into(),
            salt_hex: "b".repeat(32),
        })
        .unwrap();
        assert_ne!(a.key_bytes(), b.key_bytes());
    }

    #[test]
    fn test_short_salt_rejected() {
        let config = KeyConfig::Derived {
            master_secret: "test-secret".into(),
            salt_hex: "ab".repeat(8), // 8 bytes after decode
        };
        let err = KeyMaterial::resolve(&config).unwrap_err();
        assert!(matches!(err, FederatedError::Configuration(_)));
    }

    #[test]
    fn test_env_resolution_order() {
        // Single test for all env paths; parallel tests must not touch
        // these variables.
        std::env::remove_var(ENV_AES_KEY);
        std::env::remove_var(ENV_MASTER_SECRET);
        std::env::remove_var(ENV_SALT);

        // Nothing set: configuration error before any encryption attempt
        assert!(KeyConfig::from_env().is_err());

        // Secret without salt
        std::env::set_var(ENV_MASTER_SECRET, "env-secret");
        assert!(KeyConfig::from_env().is_err());

        // Secret + salt: derived path
        std::env::set_var(ENV_SALT, "c".repeat(32));
        assert!(matches!(
            KeyConfig::from_env().unwrap(),
            KeyConfig::Derived { .. }
        ));

        // Direct key takes precedence over the pair
        std::env::set_var(ENV_AES_KEY, b64_key(9));
        assert!(matches!(
            KeyConfig::from_env().unwrap(),
            KeyConfig::Direct { .. }
        ));

        std::env::remove_var(ENV_AES_KEY);
        std::env::remove_var(ENV_MASTER_SECRET);
        std::env::remove_var(ENV_SALT);
    }
}
