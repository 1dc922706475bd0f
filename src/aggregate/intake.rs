//! Intake pipeline — decrypt and verify submitted packages
//!
//! The coordinator-facing half of "submit encrypted updates": each
//! (device, package) pair is decrypted and checked against its plaintext
//! hash independently, so one bad submission never taints the rest.
//! Whether to aggregate the survivors or abort the whole round stays the
//! caller's decision.

use crate::error::FederatedError;
use crate::model::weights::ModelWeights;
use crate::secure::channel::{SecureChannel, SecurePackage};
use serde::{Deserialize, Serialize};

/// One encrypted update as received from a client device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub device_id: String,
    pub package: SecurePackage,
}

#[derive(Debug, Clone)]
pub struct AcceptedUpdate {
    pub device_id: String,
    pub weights: ModelWeights,
}

#[derive(Debug)]
pub struct RejectedUpdate {
    pub device_id: String,
    pub reason: FederatedError,
}

/// Per-device outcomes of one intake pass
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<AcceptedUpdate>,
    pub rejected: Vec<RejectedUpdate>,
}

impl IntakeReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// The surviving weights, ready to hand to the aggregator
    pub fn weights(&self) -> Vec<ModelWeights> {
        self.accepted.iter().map(|a| a.weights.clone()).collect()
    }
}

/// Decrypt one package and double-check the plaintext against the hash
/// computed by the sender before encryption. The second check catches
/// canonicalization bugs the AEAD tag alone cannot.
pub fn decrypt_and_verify(
    channel: &SecureChannel,
    package: &SecurePackage,
) -> Result<ModelWeights, FederatedError> {
    let weights = channel.decrypt(package)?;
    if !channel.verify_integrity(&weights, &package.integrity_hash) {
        return Err(FederatedError::Integrity(
            "Decrypted payload does not match the package hash".into(),
        ));
    }
    Ok(weights)
}

/// Run the decrypt+verify pipeline over a whole batch of submissions,
/// classifying each device independently.
pub fn unseal_batch(channel: &SecureChannel, submissions: &[Submission]) -> IntakeReport {
    let mut report = IntakeReport::default();
    for submission in submissions {
        match decrypt_and_verify(channel, &submission.package) {
            Ok(weights) => report.accepted.push(AcceptedUpdate {
                device_id: submission.device_id.clone(),
                weights,
            }),
            Err(reason) => {
                log::warn!("Rejected update from {}: {}", submission.device_id, reason);
                report.rejected.push(RejectedUpdate {
                    device_id: submission.device_id.clone(),
                    reason,
                });
            }
        }
    }
    log::info!(
        "Intake complete: {} accepted, {} rejected",
        report.accepted.len(),
        report.rejected.len()
    );
    report
}
