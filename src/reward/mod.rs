//! Multi-Level Reward Calculator
//!
//! ```text
//! order paid ──▶ idempotency check ──▶ referrer ──▶ chain walk (≤ configured levels)
//!                                                        │
//!                       commit ◀── credit + earnings ◀── reward rows ◀── plan
//! ```

pub mod calculator;
pub mod models;
pub mod plan;

pub use calculator::RewardCalculator;
pub use models::{DistributionOutcome, Reward, RewardRequest, RewardStatus};
pub use plan::{PlannedReward, plan_rewards};
