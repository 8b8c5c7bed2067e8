//! Reward (commission record) types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{BrandId, DistributorId, OrderId, RewardId, UserId};
use crate::error::{CommissionError, CommissionResult};
use crate::money;

/// Reward status. `Pending -> Settled` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum RewardStatus {
    /// Recorded, not yet reflected in the balance
    Pending = 0,
    /// Credited to the distributor's balance
    Settled = 1,
}

impl RewardStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(RewardStatus::Pending),
            1 => Some(RewardStatus::Settled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatus::Pending => "pending",
            RewardStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub order_id: OrderId,
    pub distributor_id: DistributorId,
    pub level: i32,
    pub amount: Decimal,
    pub status: RewardStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// A paid order to distribute commissions for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRequest {
    pub order_id: OrderId,
    pub brand_id: BrandId,
    /// Purchaser; never rewarded for their own order
    pub buyer_user_id: UserId,
    /// Hierarchy level of the direct referrer, normally 1
    pub start_level: i32,
    pub referrer_id: Option<DistributorId>,
    pub order_amount: Decimal,
}

impl RewardRequest {
    pub fn validate(&self) -> CommissionResult<()> {
        money::check_amount("order amount", self.order_amount, money::STORAGE_SCALE)?;
        if self.start_level < 1 {
            return Err(CommissionError::invalid(format!(
                "start level must be >= 1, got {}",
                self.start_level
            )));
        }
        Ok(())
    }
}

/// What a distribution call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionOutcome {
    /// The order was distributed by an earlier call; nothing written
    AlreadyDistributed,
    /// No referrer, or the referrer is missing or disabled
    NoReferrer,
    /// Chain or configuration produced no payable level
    NothingToDistribute,
    Distributed { rewards: Vec<Reward>, total: Decimal },
}

impl DistributionOutcome {
    pub fn rewards(&self) -> &[Reward] {
        match self {
            DistributionOutcome::Distributed { rewards, .. } => rewards,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RewardRequest {
        RewardRequest {
            order_id: 1,
            brand_id: 1,
            buyer_user_id: 10,
            start_level: 1,
            referrer_id: Some(5),
            order_amount: Decimal::new(1000, 0),
        }
    }

    #[test]
    fn test_status_ids() {
        assert_eq!(RewardStatus::from_id(0), Some(RewardStatus::Pending));
        assert_eq!(RewardStatus::from_id(1), Some(RewardStatus::Settled));
        assert_eq!(RewardStatus::from_id(2), None);
        assert_eq!(RewardStatus::Settled.to_string(), "settled");
    }

    #[test]
    fn test_request_validation() {
        assert!(request().validate().is_ok());

        let mut zero = request();
        zero.order_amount = Decimal::ZERO;
        assert!(matches!(zero.validate(), Err(CommissionError::InvalidInput(_))));

        let mut huge = request();
        huge.order_amount = Decimal::from(10_000_000_000_000i64);
        assert!(matches!(huge.validate(), Err(CommissionError::InvalidInput(_))));

        let mut bad_level = request();
        bad_level.start_level = 0;
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_outcome_rewards_accessor() {
        assert!(DistributionOutcome::NoReferrer.rewards().is_empty());
        assert!(DistributionOutcome::AlreadyDistributed.rewards().is_empty());
    }
}
