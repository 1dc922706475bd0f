//! Aggregator — the coordinator's averaging state machine
//!
//! Holds the current GlobalModel behind a lock and folds in batches of
//! already-decrypted, already-verified client updates by unweighted
//! element-wise averaging (every client counts equally, regardless of how
//! many local samples backed its update). The whole
//! validate → average → version → history → swap sequence runs as one
//! critical section, so readers only ever observe fully-formed models and
//! a failed batch leaves state byte-for-byte unchanged.

use crate::error::FederatedError;
use crate::model::weights::{ModelWeights, CATEGORY_DIM, SPENDING_DIM, TEMPORAL_DIM};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Two meaningful lifecycle states; there is no rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    /// Placeholder weights, zero rounds performed
    Initialized,
    /// Weights derived from at least one real round
    Aggregated,
}

/// One append-only history entry per successful round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub timestamp: DateTime<Utc>,
    pub client_count: usize,
    pub version: String,
}

/// Coordinator-owned state, replaced wholesale on every successful round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalModel {
    pub weights: ModelWeights,
    /// Clients folded into the latest aggregation
    pub update_count: usize,
    /// Client count of the most recent round
    pub client_count: usize,
    pub update_history: Vec<RoundRecord>,
    pub state: ModelState,
}

/// Read-only status snapshot for dashboards and health endpoints
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub model: GlobalModel,
    pub rounds: u64,
    pub last_round: Option<RoundRecord>,
    pub model_hash: String,
}

struct AggregatorState {
    model: GlobalModel,
    rounds: u64,
}

/// Owned, injectable aggregation state — callers hold an `Aggregator` (or
/// an `Arc` of one) rather than reaching through a global singleton.
pub struct Aggregator {
    state: RwLock<AggregatorState>,
}

impl Aggregator {
    /// Seed the untrained global model with random placeholder vectors.
    /// This explicitly is not an aggregation round: version stays 1.0.0.
    pub fn new() -> Self {
        let model = GlobalModel {
            weights: ModelWeights::placeholder(),
            update_count: 0,
            client_count: 0,
            update_history: Vec::new(),
            state: ModelState::Initialized,
        };
        Self {
            state: RwLock::new(AggregatorState { model, rounds: 0 }),
        }
    }

    /// Fold one batch of client updates into a new global model.
    ///
    /// Fails with a validation error on an empty batch or any shape
    /// mismatch, in which case the held model is completely unchanged.
    pub fn aggregate(&self, batch: &[ModelWeights]) -> Result<GlobalModel, FederatedError> {
        let mut state = self.state.write();

        if batch.is_empty() {
            return Err(FederatedError::Validation("Empty update batch".into()));
        }
        for weights in batch {
            weights.validate_shape()?;
        }

        let n = batch.len() as f64;
        let round = state.rounds + 1;
        let version = format!("1.{}.0", round);
        let now = Utc::now();

        let weights = ModelWeights {
            anomaly_threshold: batch.iter().map(|w| w.anomaly_threshold).sum::<f64>() / n,
            spending_patterns: vector_mean(batch, SPENDING_DIM, |w| &w.spending_patterns),
            category_weights: vector_mean(batch, CATEGORY_DIM, |w| &w.category_weights),
            temporal_factors: vector_mean(batch, TEMPORAL_DIM, |w| &w.temporal_factors),
            version: version.clone(),
            produced_at: now,
        };

        let mut update_history = state.model.update_history.clone();
        update_history.push(RoundRecord {
            timestamp: now,
            client_count: batch.len(),
            version: version.clone(),
        });

        let model = GlobalModel {
            weights,
            update_count: batch.len(),
            client_count: batch.len(),
            update_history,
            state: ModelState::Aggregated,
        };

        state.model = model.clone();
        state.rounds = round;

        log::info!(
            "Aggregation round {} complete: {} clients -> version {}",
            round,
            batch.len(),
            version
        );

        Ok(model)
    }

    /// Read-only snapshot of the current global model
    pub fn current_model(&self) -> GlobalModel {
        self.state.read().model.clone()
    }

    /// Canonical hash of the current weights, recomputed on demand
    pub fn model_hash(&self) -> Result<String, FederatedError> {
        self.state.read().model.weights.content_hash()
    }

    /// Rounds performed so far
    pub fn rounds(&self) -> u64 {
        self.state.read().rounds
    }

    /// Model, round count, last round record, and hash in one snapshot
    pub fn summary(&self) -> Result<UpdateSummary, FederatedError> {
        let state = self.state.read();
        Ok(UpdateSummary {
            model: state.model.clone(),
            rounds: state.rounds,
            last_round: state.model.update_history.last().cloned(),
            model_hash: state.model.weights.content_hash()?,
        })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn vector_mean<F>(batch: &[ModelWeights], dim: usize, field: F) -> Vec<f64>
where
    F: Fn(&ModelWeights) -> &[f64],
{
    let n = batch.len() as f64;
    let mut out = vec![0.0; dim];
    for weights in batch {
        for (i, v) in field(weights).iter().enumerate() {
            out[i] += v;
        }
    }
    for v in &mut out {
        *v /= n;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_update(threshold: f64, fill: f64) -> ModelWeights {
        ModelWeights {
            anomaly_threshold: threshold,
            spending_patterns: vec![fill; SPENDING_DIM],
            category_weights: vec![fill; CATEGORY_DIM],
            temporal_factors: vec![fill; TEMPORAL_DIM],
            version: "1.0.0".into(),
            produced_at: Utc::now(),
        }
    }

    #[test]
    fn test_elementwise_mean() {
        let agg = Aggregator::new();
        let model = agg
            .aggregate(&[client_update(0.4, 1.0), client_update(0.6, 3.0)])
            .unwrap();

        assert!((model.weights.anomaly_threshold - 0.5).abs() < 1e-12);
        assert!(model.weights.spending_patterns.iter().all(|v| (v - 2.0).abs() < 1e-12));
        assert!(model.weights.category_weights.iter().all(|v| (v - 2.0).abs() < 1e-12));
        assert!(model.weights.temporal_factors.iter().all(|v| (v - 2.0).abs() < 1e-12));
        assert_eq!(model.client_count, 2);
        assert_eq!(model.update_count, 2);
    }

    #[test]
    fn test_empty_batch_rejected_and_state_unchanged() {
        let agg = Aggregator::new();
        let before = agg.model_hash().unwrap();

        let err = agg.aggregate(&[]).unwrap_err();
        assert!(matches!(err, FederatedError::Validation(_)));

        assert_eq!(agg.model_hash().unwrap(), before);
        assert_eq!(agg.rounds(), 0);
        assert_eq!(agg.current_model().state, ModelState::Initialized);
    }

    #[test]
    fn test_shape_mismatch_rejected_without_partial_commit() {
        let agg = Aggregator::new();
        agg.aggregate(&[client_update(0.5, 1.0)]).unwrap();
        let before = agg.current_model();

        let mut bad = client_update(0.5, 1.0);
        bad.temporal_factors.pop();
        let err = agg.aggregate(&[client_update(0.4, 2.0), bad]).unwrap_err();
        assert!(matches!(err, FederatedError::Validation(_)));

        let after = agg.current_model();
        assert_eq!(after.weights, before.weights);
        assert_eq!(after.update_history, before.update_history);
        assert_eq!(agg.rounds(), 1);
    }

    #[test]
    fn test_history_and_version_advance_per_round() {
        let agg = Aggregator::new();
        assert_eq!(agg.current_model().weights.version, "1.0.0");

        for round in 1..=5u64 {
            let model = agg.aggregate(&[client_update(0.5, 1.0)]).unwrap();
            assert_eq!(model.weights.version, format!("1.{}.0", round));
            assert_eq!(model.update_history.len(), round as usize);
            assert_eq!(model.state, ModelState::Aggregated);
        }

        let history = agg.current_model().update_history;
        assert_eq!(history.len(), 5);
        for (i, record) in history.iter().enumerate() {
            assert_eq!(record.version, format!("1.{}.0", i + 1));
            assert_eq!(record.client_count, 1);
        }
    }

    #[test]
    fn test_model_hash_tracks_current_weights() {
        let agg = Aggregator::new();
        let h0 = agg.model_hash().unwrap();
        agg.aggregate(&[client_update(0.4, 1.0)]).unwrap();
        let h1 = agg.model_hash().unwrap();

        assert_ne!(h0, h1);
        assert_eq!(h1, agg.current_model().weights.content_hash().unwrap());
    }

    #[test]
    fn test_summary() {
        let agg = Aggregator::new();
        let summary = agg.summary().unwrap();
        assert_eq!(summary.rounds, 0);
        assert!(summary.last_round.is_none());

        agg.aggregate(&[client_update(0.5, 1.0), client_update(0.7, 2.0)])
            .unwrap();
        let summary = agg.summary().unwrap();
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.last_round.unwrap().client_count, 2);
        assert_eq!(summary.model_hash, agg.model_hash().unwrap());
    }

    #[test]
    fn test_concurrent_rounds_never_lose_history() {
        use std::sync::Arc;

        let agg = Arc::new(Aggregator::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let agg = Arc::clone(&agg);
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    agg.aggregate(&[client_update(0.5, 1.0)]).unwrap();
                    // Readers must always see weights and history from the
                    // same round
                    let model = agg.current_model();
                    let round: u64 = model.weights.version
                        .split('.')
                        .nth(1)
                        .unwrap()
                        .parse()
                        .unwrap();
                    assert_eq!(model.update_history.len() as u64, round);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(agg.rounds(), 100);
        assert_eq!(agg.current_model().update_history.len(), 100);
        assert_eq!(agg.current_model().weights.version, "1.100.0");
    }
}
