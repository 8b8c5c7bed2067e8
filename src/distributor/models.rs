//! Data models for distributors

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{BrandId, DistributorId, UserId};

/// Distributor status. Distributors are never deleted, only disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum DistributorStatus {
    Disabled = 0,
    Active = 1,
}

impl DistributorStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(DistributorStatus::Disabled),
            1 => Some(DistributorStatus::Active),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistributorStatus::Disabled => "disabled",
            DistributorStatus::Active => "active",
        }
    }
}

impl fmt::Display for DistributorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DistributorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(DistributorStatus::Active),
            "disabled" => Ok(DistributorStatus::Disabled),
            _ => Err(format!("Invalid distributor status: {}", s)),
        }
    }
}

/// A user allowed to earn commissions within one brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributor {
    pub id: DistributorId,
    pub user_id: UserId,
    pub brand_id: BrandId,
    /// Weak reference; may point at a disabled distributor
    pub referrer_id: Option<DistributorId>,
    pub level: i32,
    pub status: DistributorStatus,
    pub total_earnings: Decimal,
    pub subordinates_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Distributor {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == DistributorStatus::Active
    }
}

/// Typed partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorUpdate {
    pub level: Option<i32>,
    pub status: Option<DistributorStatus>,
}

impl DistributorUpdate {
    pub fn level(level: i32) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn status(status: DistributorStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.status.is_none()
    }
}

/// Input for creating a distributor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDistributor {
    pub user_id: UserId,
    pub brand_id: BrandId,
    /// Candidate referrer; dropped when it fails validation
    pub referrer_id: Option<DistributorId>,
    pub level: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ids() {
        assert_eq!(
            DistributorStatus::from_id(DistributorStatus::Active.id()),
            Some(DistributorStatus::Active)
        );
        assert_eq!(
            DistributorStatus::from_id(DistributorStatus::Disabled.id()),
            Some(DistributorStatus::Disabled)
        );
        assert_eq!(DistributorStatus::from_id(7), None);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("ACTIVE".parse::<DistributorStatus>(), Ok(DistributorStatus::Active));
        assert_eq!("disabled".parse::<DistributorStatus>(), Ok(DistributorStatus::Disabled));
        assert!("banned".parse::<DistributorStatus>().is_err());
    }

    #[test]
    fn test_update_builders() {
        assert!(DistributorUpdate::default().is_empty());

        let u = DistributorUpdate::level(2);
        assert_eq!(u.level, Some(2));
        assert_eq!(u.status, None);
        assert!(!u.is_empty());

        let u = DistributorUpdate::status(DistributorStatus::Disabled);
        assert_eq!(u.level, None);
        assert_eq!(u.status, Some(DistributorStatus::Disabled));
    }
}
