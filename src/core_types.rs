//! Core types used throughout the engine
//!
//! Identifiers are plain `i64` so they bind directly to PostgreSQL `BIGINT`
//! columns without conversion.

/// User ID - assigned by the external account system.
///
/// Also the key of the user's withdrawable balance.
pub type UserId = i64;

/// Brand (campaign) ID - scopes distributors and level reward rules.
pub type BrandId = i64;

/// Distributor ID - primary key of `distributors`.
pub type DistributorId = i64;

/// Order ID - assigned by the external order-processing system.
pub type OrderId = i64;

/// Reward ID - primary key of `rewards`.
pub type RewardId = i64;

/// Withdrawal ID - primary key of `withdrawals`.
pub type WithdrawalId = i64;

/// Application ID - primary key of `distributor_applications`.
pub type ApplicationId = i64;

/// Admin ID - the authenticated operator performing a review action.
pub type AdminId = i64;
