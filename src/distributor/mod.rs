//! Distributor Directory
//!
//! Distributor records, referrer chain lookup and status/level mutation.

pub mod chain;
pub mod models;
pub mod repository;

pub use chain::{ChainStop, ChainWalker, ReferrerChain};
pub use models::{Distributor, DistributorStatus, DistributorUpdate, NewDistributor};
pub use repository::DistributorDirectory;
