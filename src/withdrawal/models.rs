//! Withdrawal state machine and records
//!
//! ```text
//! PENDING(0) ──approve──▶ APPROVED(10)
//!     └──────reject─────▶ REJECTED(-10)   (amount refunded)
//! ```
//! Terminal states have no outgoing transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::core_types::{AdminId, UserId, WithdrawalId};
use crate::error::{CommissionError, CommissionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum WithdrawalStatus {
    /// Funds already debited, awaiting review
    Pending = 0,
    /// Terminal: paid out
    Approved = 10,
    /// Terminal: funds refunded
    Rejected = -10,
}

impl WithdrawalStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }

    /// Only `Pending` may move, and only to a terminal state
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Pending, WithdrawalStatus::Rejected)
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(WithdrawalStatus::Pending),
            10 => Some(WithdrawalStatus::Approved),
            -10 => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout destination supplied with the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BankInfo {
    #[validate(length(min = 1, max = 128))]
    pub bank_name: String,
    #[validate(length(min = 4, max = 64))]
    pub bank_account: String,
    #[validate(length(min = 1, max = 128))]
    pub account_name: String,
}

impl BankInfo {
    pub fn new(
        bank_name: impl Into<String>,
        bank_account: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        Self {
            bank_name: bank_name.into(),
            bank_account: bank_account.into(),
            account_name: account_name.into(),
        }
    }

    /// Trim surrounding whitespace, then check field lengths
    pub fn normalized(self) -> CommissionResult<Self> {
        let info = Self {
            bank_name: self.bank_name.trim().to_string(),
            bank_account: self.bank_account.trim().to_string(),
            account_name: self.account_name.trim().to_string(),
        };
        info.validate()
            .map_err(|e| CommissionError::invalid(format!("bank info: {}", e)))?;
        Ok(info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    pub bank: BankInfo,
    /// Reviewing admin (set on approve and on reject)
    pub approved_by: Option<AdminId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use WithdrawalStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Approved, Rejected] {
            assert!(terminal.is_terminal());
            for next in [Pending, Approved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn test_status_ids() {
        for s in [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected,
        ] {
            assert_eq!(WithdrawalStatus::from_id(s.id()), Some(s));
        }
        // the partial unique index in the schema keys on this id
        assert_eq!(WithdrawalStatus::Pending.id(), 0);
        assert_eq!(WithdrawalStatus::from_id(1), None);
    }

    #[test]
    fn test_bank_info_normalized() {
        let info = BankInfo::new("  First Bank ", " 0123456789 ", "Ada L")
            .normalized()
            .unwrap();
        assert_eq!(info.bank_name, "First Bank");
        assert_eq!(info.bank_account, "0123456789");

        let blank = BankInfo::new("   ", "0123456789", "Ada L").normalized();
        assert!(matches!(blank, Err(CommissionError::InvalidInput(_))));

        let short_account = BankInfo::new("First Bank", "12", "Ada L").normalized();
        assert!(short_account.is_err());
    }
}
