//! Level reward rule types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::BrandId;
use crate::error::{CommissionError, CommissionResult};
use crate::money::{apply_rate, round_to_unit};

/// How a level's reward is derived from the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum RewardType {
    /// Flat amount per order
    Fixed = 1,
    /// Fraction of the order amount (0.10 = 10%)
    Percentage = 2,
}

impl RewardType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(RewardType::Fixed),
            2 => Some(RewardType::Percentage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Fixed => "fixed",
            RewardType::Percentage => "percentage",
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Commission rule for one (brand, level)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRewardRule {
    pub brand_id: BrandId,
    pub level: i32,
    pub reward_type: RewardType,
    pub reward_value: Decimal,
}

impl LevelRewardRule {
    /// Reward owed for an order of `order_amount`, rounded to the currency unit
    pub fn reward_for(&self, order_amount: Decimal, scale: u32) -> Decimal {
        match self.reward_type {
            RewardType::Percentage => apply_rate(order_amount, self.reward_value, scale),
            RewardType::Fixed => round_to_unit(self.reward_value, scale),
        }
    }
}

/// One entry of a brand's rule set, as submitted by an admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRewardSetting {
    pub level: i32,
    pub reward_type: RewardType,
    pub reward_value: Decimal,
}

impl LevelRewardSetting {
    pub fn new(level: i32, reward_type: RewardType, reward_value: Decimal) -> Self {
        Self {
            level,
            reward_type,
            reward_value,
        }
    }

    pub fn into_rule(self, brand_id: BrandId) -> LevelRewardRule {
        LevelRewardRule {
            brand_id,
            level: self.level,
            reward_type: self.reward_type,
            reward_value: self.reward_value,
        }
    }
}

/// Reject rule sets that could pay out more than the order is worth.
///
/// Levels must be >= 1 and unique, values non-negative, each percentage at
/// most 1 and all percentages together at most 1.
pub fn validate_settings(settings: &[LevelRewardSetting]) -> CommissionResult<()> {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut percentage_total = Decimal::ZERO;

    for s in settings {
        if s.level < 1 {
            return Err(CommissionError::invalid(format!(
                "level must be >= 1, got {}",
                s.level
            )));
        }
        if !seen.insert(s.level) {
            return Err(CommissionError::invalid(format!(
                "level {} configured twice",
                s.level
            )));
        }
        if s.reward_value < Decimal::ZERO {
            return Err(CommissionError::invalid(format!(
                "level {} reward value is negative",
                s.level
            )));
        }
        if s.reward_type == RewardType::Percentage {
            if s.reward_value > Decimal::ONE {
                return Err(CommissionError::invalid(format!(
                    "level {} percentage {} exceeds 1",
                    s.level, s.reward_value
                )));
            }
            percentage_total += s.reward_value;
        }
    }

    if percentage_total > Decimal::ONE {
        return Err(CommissionError::invalid(format!(
            "percentages sum to {} which exceeds 1",
            percentage_total
        )));
    }
    Ok(())
}
