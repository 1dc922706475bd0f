//! ModelWeights — the unit exchanged and aggregated
//!
//! A weights instance is a small statistical summary of one client's
//! ledger: an anomaly threshold plus three fixed-length vectors. The
//! 10/5/7 shape is a wire contract; mismatched vectors are rejected,
//! never truncated or padded.

use crate::error::FederatedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ten most recent z-scored transaction amounts
pub const SPENDING_DIM: usize = 10;
/// Four fixed ledger categories plus one slot for anything else
pub const CATEGORY_DIM: usize = 5;
/// Day-of-week distribution, Monday first
pub const TEMPORAL_DIM: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    /// Scalar in [0, 1]
    pub anomaly_threshold: f64,
    pub spending_patterns: Vec<f64>,
    pub category_weights: Vec<f64>,
    pub temporal_factors: Vec<f64>,
    pub version: String,
    pub produced_at: DateTime<Utc>,
}

impl ModelWeights {
    /// Untrained seed state: random valid-range vectors, version 1.0.0.
    /// Never confused with a real aggregation round.
    pub fn placeholder() -> Self {
        let mut rng = rand::thread_rng();
        use rand::Rng;
        Self {
            anomaly_threshold: 0.5,
            spending_patterns: (0..SPENDING_DIM).map(|_| rng.gen::<f64>()).collect(),
            category_weights: (0..CATEGORY_DIM).map(|_| rng.gen::<f64>()).collect(),
            temporal_factors: (0..TEMPORAL_DIM).map(|_| rng.gen::<f64>()).collect(),
            version: "1.0.0".to_string(),
            produced_at: Utc::now(),
        }
    }

    /// Enforce the fixed 10/5/7 schema
    pub fn validate_shape(&self) -> Result<(), FederatedError> {
        let checks = [
            ("spending_patterns", self.spending_patterns.len(), SPENDING_DIM),
            ("category_weights", self.category_weights.len(), CATEGORY_DIM),
            ("temporal_factors", self.temporal_factors.len(), TEMPORAL_DIM),
        ];
        for (field, got, want) in checks {
            if got != want {
                return Err(FederatedError::Validation(format!(
                    "{} has length {}, expected {}",
                    field, got, want
                )));
            }
        }
        Ok(())
    }

    /// Canonical serialization: key-sorted JSON, so the same logical
    /// content always serializes identically on both ends of the wire.
    pub fn canonical_json(&self) -> Result<String, FederatedError> {
        let value = serde_json::to_value(self)
            .map_err(|e| FederatedError::Encoding(format!("Serialize weights: {}", e)))?;
        serde_json::to_string(&value)
            .map_err(|e| FederatedError::Encoding(format!("Serialize weights: {}", e)))
    }

    /// SHA-256 over the canonical form, hex-encoded
    pub fn content_hash(&self) -> Result<String, FederatedError> {
        let canonical = self.canonical_json()?;
        let mut h = Sha256::new();
        h.update(canonical.as_bytes());
        Ok(hex::encode(h.finalize()))
    }
}

/// What a client hands to the transport layer: weights plus their own
/// content hash, so the coordinator can double-check after decryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsExport {
    pub weights: ModelWeights,
    pub hash: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_shape_is_valid() {
        let w = ModelWeights::placeholder();
        assert!(w.validate_shape().is_ok());
        assert_eq!(w.version, "1.0.0");
        assert!((0.0..=1.0).contains(&w.anomaly_threshold));
    }

    #[test]
    fn test_shape_rejection() {
        let mut w = ModelWeights::placeholder();
        w.spending_patterns.push(0.0);
        assert!(w.validate_shape().is_err());

        let mut w = ModelWeights::placeholder();
        w.category_weights.truncate(3);
        let err = w.validate_shape().unwrap_err();
        assert!(err.to_string().contains("category_weights"));
    }

    #[test]
    fn test_canonical_json_is_key_sorted() {
        let w = ModelWeights::placeholder();
        let json = w.canonical_json().unwrap();
        let anomaly = json.find("anomaly_threshold").unwrap();
        let version = json.find("version").unwrap();
        assert!(anomaly < version);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let w = ModelWeights::placeholder();
        assert_eq!(w.content_hash().unwrap(), w.content_hash().unwrap());
    }

    #[test]
    fn test_content_hash_tracks_content() {
        let a = ModelWeights::placeholder();
        let mut b = a.clone();
        b.anomaly_threshold = 0.75;
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn test_serde_round_trip_preserves_equality() {
        let w = ModelWeights::placeholder();
        let json = serde_json::to_string(&w).unwrap();
        let back: ModelWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(w, back);
        assert_eq!(w.content_hash().unwrap(), back.content_hash().unwrap());
    }
}
