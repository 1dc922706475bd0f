//! fedledger-core — federated anomaly-model core for ledger apps
//!
//! Clients summarize private transaction records into small weight
//! vectors, ship them under authenticated encryption, and a coordinator
//! averages them into a global model without ever seeing a cleartext
//! update on the wire.

pub mod aggregate;
pub mod error;
pub mod model;
pub mod secure;

pub use aggregate::{Aggregator, GlobalModel, Submission};
pub use error::FederatedError;
pub use model::{LocalTrainer, ModelWeights, TransactionRecord};
pub use secure::{KeyConfig, SecureChannel, SecurePackage};
