//! Coordinator side: intake of encrypted updates and global-model averaging

pub mod aggregator;
pub mod intake;

pub use aggregator::{Aggregator, GlobalModel, ModelState, RoundRecord, UpdateSummary};
pub use intake::{decrypt_and_verify, unseal_batch, IntakeReport, Submission};
