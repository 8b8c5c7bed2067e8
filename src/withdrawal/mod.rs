//! Withdrawal Workflow
//!
//! Apply debits the balance up front; approve only records the payout;
//! reject refunds. One pending withdrawal per user at a time.

pub mod models;
pub mod service;

pub use models::{BankInfo, Withdrawal, WithdrawalStatus};
pub use service::WithdrawalService;
