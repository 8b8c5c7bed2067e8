//! Level Reward Configuration Store
//!
//! Per-brand commission rules, one per hierarchy level.

pub mod models;
pub mod repository;

pub use models::{LevelRewardRule, LevelRewardSetting, RewardType, validate_settings};
pub use repository::LevelRewardStore;
