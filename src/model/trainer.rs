//! LocalTrainer — on-device weight derivation from ledger records
//!
//! "Training" here is statistical summarization: amount mean/std drive the
//! anomaly threshold, recent amounts are z-scored into spending patterns,
//! and category/weekday frequencies fill the remaining vectors. Only the
//! most recent 100 records are considered; older ones are dropped outright
//! rather than weighted down.

use crate::error::FederatedError;
use crate::model::weights::{ModelWeights, WeightsExport, CATEGORY_DIM, SPENDING_DIM, TEMPORAL_DIM};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of records considered per training pass
pub const TRAINING_WINDOW: usize = 100;

/// The four fixed ledger categories, plus a bucket for anything else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Sale,
    Purchase,
    Expense,
    Receipt,
    #[serde(other)]
    Other,
}

impl TransactionCategory {
    /// Slot in the category_weights vector
    pub fn slot(&self) -> usize {
        match self {
            TransactionCategory::Sale => 0,
            TransactionCategory::Purchase => 1,
            TransactionCategory::Expense => 2,
            TransactionCategory::Receipt => 3,
            TransactionCategory::Other => 4,
        }
    }
}

/// One raw ledger record, as the surrounding application stores it.
/// Dates stay strings; unparseable ones are skipped during training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub amount: f64,
    pub category: TransactionCategory,
    /// Expected format: %Y-%m-%d
    pub date: String,
}

impl TransactionRecord {
    /// Generate synthetic records for demos and tests
    pub fn synthetic(n: usize) -> Vec<Self> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let categories = [
            TransactionCategory::Sale,
            TransactionCategory::Purchase,
            TransactionCategory::Expense,
            TransactionCategory::Receipt,
        ];
        (0..n)
            .map(|i| {
                let day = Utc::now() - chrono::Duration::days(rng.gen_range(0..30));
                TransactionRecord {
                    amount: rng.gen_range(10.0..5000.0),
                    category: categories[i % categories.len()],
                    date: day.format("%Y-%m-%d").to_string(),
                }
            })
            .collect()
    }
}

/// Derives a ModelWeights summary from a bounded window of recent records.
/// Fields the current window cannot inform keep their previous values.
pub struct LocalTrainer {
    weights: ModelWeights,
    model_version: String,
    skipped_dates: u64,
}

impl LocalTrainer {
    pub fn new() -> Self {
        let weights = ModelWeights::placeholder();
        let model_version = weights.version.clone();
        Self {
            weights,
            model_version,
            skipped_dates: 0,
        }
    }

    /// Run one training pass over the ledger. Returns the updated weights;
    /// an empty record set leaves them untouched.
    pub fn train(&mut self, records: &[TransactionRecord]) -> &ModelWeights {
        if records.is_empty() {
            return &self.weights;
        }

        let start = records.len().saturating_sub(TRAINING_WINDOW);
        let window = &records[start..];

        self.learn_amounts(window);
        self.learn_categories(window);
        self.learn_weekdays(window);

        self.weights.produced_at = Utc::now();
        self.weights.version = self.model_version.clone();
        &self.weights
    }

    fn learn_amounts(&mut self, window: &[TransactionRecord]) {
        let amounts: Vec<f64> = window
            .iter()
            .map(|r| r.amount.abs())
            .filter(|a| *a > 0.0)
            .collect();
        if amounts.is_empty() {
            return;
        }

        let n = amounts.len() as f64;
        let mean = amounts.iter().sum::<f64>() / n;
        let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        // mean/(mean+std) collapses to 1 when variance vanishes and toward
        // 0 when it dominates; the clamp keeps the threshold usable.
        self.weights.anomaly_threshold = (mean / (mean + std)).clamp(0.2, 0.8);

        if amounts.len() >= SPENDING_DIM {
            let recent = &amounts[amounts.len() - SPENDING_DIM..];
            self.weights.spending_patterns = recent
                .iter()
                .map(|a| if std > 0.0 { (a - mean) / std } else { 0.0 })
                .collect();
        }
    }

    fn learn_categories(&mut self, window: &[TransactionRecord]) {
        let mut counts = [0usize; CATEGORY_DIM];
        for record in window {
            counts[record.category.slot()] += 1;
        }
        let total = window.len() as f64;
        self.weights.category_weights = counts.iter().map(|c| *c as f64 / total).collect();
    }

    fn learn_weekdays(&mut self, window: &[TransactionRecord]) {
        let mut day_counts = [0u64; TEMPORAL_DIM];
        let mut skipped = 0u64;
        for record in window {
            match NaiveDate::parse_from_str(&record.date, "%Y-%m-%d") {
                Ok(date) => day_counts[date.weekday().num_days_from_monday() as usize] += 1,
                Err(_) => skipped += 1,
            }
        }
        self.skipped_dates += skipped;
        if skipped > 0 {
            log::debug!("Skipped {} records with unparseable dates", skipped);
        }

        let total: u64 = day_counts.iter().sum();
        if total > 0 {
            self.weights.temporal_factors = day_counts
                .iter()
                .map(|d| *d as f64 / total as f64)
                .collect();
        }
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    /// Records seen so far whose dates failed to parse
    pub fn skipped_dates(&self) -> u64 {
        self.skipped_dates
    }

    /// Package the current weights for transmission
    pub fn export(&self, device_id: &str) -> Result<WeightsExport, FederatedError> {
        Ok(WeightsExport {
            weights: self.weights.clone(),
            hash: self.weights.content_hash()?,
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            model_version: self.model_version.clone(),
        })
    }
}

impl Default for LocalTrainer {
    fn default() -> Self {
        Self::new()
    }
}
