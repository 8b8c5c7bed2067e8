//! Distributor application records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::core_types::{AdminId, ApplicationId, BrandId, DistributorId, UserId};
use crate::error::{CommissionError, CommissionResult};

/// Same ids and transitions as withdrawals: only `Pending` moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum ApplicationStatus {
    Pending = 0,
    Approved = 10,
    Rejected = -10,
}

impl ApplicationStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ApplicationStatus::Pending),
            10 => Some(ApplicationStatus::Approved),
            -10 => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub brand_id: BrandId,
    pub referrer_id: Option<DistributorId>,
    pub reason: String,
    pub status: ApplicationStatus,
    pub reviewed_by: Option<AdminId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's request to become a distributor of a brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ApplicationRequest {
    pub user_id: UserId,
    pub brand_id: BrandId,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
    pub referrer_id: Option<DistributorId>,
}

impl ApplicationRequest {
    pub fn new(
        user_id: UserId,
        brand_id: BrandId,
        reason: impl Into<String>,
        referrer_id: Option<DistributorId>,
    ) -> Self {
        Self {
            user_id,
            brand_id,
            reason: reason.into(),
            referrer_id,
        }
    }

    pub fn normalized(self) -> CommissionResult<Self> {
        let req = Self {
            reason: self.reason.trim().to_string(),
            ..self
        };
        req.validate()
            .map_err(|e| CommissionError::invalid(format!("application: {}", e)))?;
        Ok(req)
    }
}
