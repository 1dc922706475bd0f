//! Local model: weight vectors and the on-device trainer

pub mod trainer;
pub mod weights;

pub use trainer::{LocalTrainer, TransactionCategory, TransactionRecord};
pub use weights::{ModelWeights, WeightsExport, CATEGORY_DIM, SPENDING_DIM, TEMPORAL_DIM};
