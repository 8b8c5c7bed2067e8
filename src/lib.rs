//! Commission Engine - multi-level distributor commissions
//!
//! When an order is paid, commissions flow up the buyer's referrer chain
//! according to per-brand level rules, land in withdrawable balances, and
//! leave through a reviewed withdrawal workflow.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier aliases (UserId, DistributorId, etc.)
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup
//! - [`error`] - Shared error taxonomy
//! - [`money`] - Currency rounding
//! - [`db`] - Connection pool, schema and scoped transactions
//! - [`level_config`] - Per-brand level reward rules
//! - [`distributor`] - Distributor directory and referrer chain walk
//! - [`reward`] - Multi-level reward calculator
//! - [`auto_upgrade`] - Buyer to distributor promotion
//! - [`ledger`] - Withdrawable balances
//! - [`withdrawal`] - Withdrawal apply/approve/reject
//! - [`application`] - Manual distributor applications
//! - [`engine`] - Facade and order-paid handling
//! - [`intake`] - NDJSON order-paid event intake

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod error;
pub mod logging;
pub mod money;

pub mod db;

// Commission components
pub mod application;
pub mod auto_upgrade;
pub mod distributor;
pub mod engine;
pub mod intake;
pub mod ledger;
pub mod level_config;
pub mod reward;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use config::{AppConfig, CommissionConfig, DatabaseConfig};
pub use core_types::{
    AdminId, ApplicationId, BrandId, DistributorId, OrderId, RewardId, UserId, WithdrawalId,
};
pub use db::Database;
pub use distributor::{Distributor, DistributorStatus, DistributorUpdate, ReferrerChain};
pub use engine::{CommissionEngine, OrderPaidEvent, OrderPaidHandler, OrderPaidReport};
pub use error::{CommissionError, CommissionResult};
pub use level_config::{LevelRewardRule, LevelRewardSetting, RewardType};
pub use reward::{DistributionOutcome, Reward, RewardRequest, RewardStatus};
pub use withdrawal::{BankInfo, Withdrawal, WithdrawalStatus};
