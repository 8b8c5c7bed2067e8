//! Withdrawal Service
//!
//! Every operation takes the user's balance row lock first (via
//! [`BalanceLedger::lock_in`]) and the withdrawal row second, so apply,
//! approve and reject for one user run one at a time.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};
use std::sync::Arc;

use super::models::{BankInfo, Withdrawal, WithdrawalStatus};
use crate::config::CommissionConfig;
use crate::core_types::{AdminId, UserId, WithdrawalId};
use crate::db::Database;
use crate::db::schema::PENDING_WITHDRAWAL_INDEX;
use crate::error::{CommissionError, CommissionResult, is_unique_violation};
use crate::ledger::BalanceLedger;
use crate::money;

const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount, status, bank_name, bank_account, \
     account_name, approved_by, approved_at, rejected_reason, created_at";

#[derive(Clone)]
pub struct WithdrawalService {
    db: Database,
    config: Arc<CommissionConfig>,
}

impl WithdrawalService {
    pub fn new(db: Database, config: Arc<CommissionConfig>) -> Self {
        Self { db, config }
    }

    /// Request a payout. The amount leaves the balance immediately and comes
    /// back only if the request is rejected.
    pub async fn apply_withdrawal(
        &self,
        user_id: UserId,
        amount: Decimal,
        bank: BankInfo,
    ) -> CommissionResult<Withdrawal> {
        check_amount(&self.config, amount)?;
        let bank = bank.normalized()?;

        let withdrawal = self
            .db
            .transaction(move |conn| {
                Box::pin(async move { Self::apply_in(conn, user_id, amount, bank).await })
            })
            .await?;

        tracing::info!(
            withdrawal_id = withdrawal.id,
            user_id = user_id,
            amount = %amount,
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Mark a pending withdrawal as paid out
    pub async fn approve_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        admin_id: AdminId,
    ) -> CommissionResult<Withdrawal> {
        let withdrawal = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    let pending = Self::lock_pending_in(conn, withdrawal_id).await?;
                    Self::finish_in(conn, &pending, WithdrawalStatus::Approved, admin_id, None).await
                })
            })
            .await?;

        tracing::info!(
            withdrawal_id = withdrawal_id,
            admin_id = admin_id,
            user_id = withdrawal.user_id,
            amount = %withdrawal.amount,
            "Withdrawal approved"
        );
        Ok(withdrawal)
    }

    /// Reject a pending withdrawal and refund its amount
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        admin_id: AdminId,
        reason: &str,
    ) -> CommissionResult<Withdrawal> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(CommissionError::invalid("rejection reason must not be empty"));
        }

        let withdrawal = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    let pending = Self::lock_pending_in(conn, withdrawal_id).await?;
                    let rejected = Self::finish_in(
                        conn,
                        &pending,
                        WithdrawalStatus::Rejected,
                        admin_id,
                        Some(reason),
                    )
                    .await?;
                    BalanceLedger::credit_in(conn, rejected.user_id, rejected.amount).await?;
                    Ok(rejected)
                })
            })
            .await?;

        tracing::info!(
            withdrawal_id = withdrawal_id,
            admin_id = admin_id,
            user_id = withdrawal.user_id,
            refunded = %withdrawal.amount,
            "Withdrawal rejected"
        );
        Ok(withdrawal)
    }

    pub async fn get_withdrawal(&self, withdrawal_id: WithdrawalId) -> CommissionResult<Withdrawal> {
        Self::fetch(self.db.pool(), withdrawal_id)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("withdrawal {}", withdrawal_id)))
    }

    /// A user's withdrawals, newest first
    pub async fn list_withdrawals(&self, user_id: UserId) -> CommissionResult<Vec<Withdrawal>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_withdrawal).collect()
    }

    async fn apply_in(
        conn: &mut PgConnection,
        user_id: UserId,
        amount: Decimal,
        bank: BankInfo,
    ) -> CommissionResult<Withdrawal> {
        BalanceLedger::lock_in(&mut *conn, user_id).await?;

        let pending: Option<WithdrawalId> =
            sqlx::query_scalar("SELECT id FROM withdrawals WHERE user_id = $1 AND status = $2")
                .bind(user_id)
                .bind(WithdrawalStatus::Pending.id())
                .fetch_optional(&mut *conn)
                .await?;
        if let Some(id) = pending {
            return Err(CommissionError::conflict(format!(
                "withdrawal {} is still pending",
                id
            )));
        }

        BalanceLedger::debit_in(&mut *conn, user_id, amount).await?;

        let row = sqlx::query(&format!(
            r#"INSERT INTO withdrawals (user_id, amount, status, bank_name, bank_account, account_name)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {}"#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .bind(amount)
        .bind(WithdrawalStatus::Pending.id())
        .bind(&bank.bank_name)
        .bind(&bank.bank_account)
        .bind(&bank.account_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some(PENDING_WITHDRAWAL_INDEX)) {
                CommissionError::conflict(format!("user {} already has a pending withdrawal", user_id))
            } else {
                CommissionError::from(e)
            }
        })?;

        row_to_withdrawal(&row)
    }

    /// Lock balance then withdrawal row; fails unless the withdrawal is pending
    async fn lock_pending_in(
        conn: &mut PgConnection,
        withdrawal_id: WithdrawalId,
    ) -> CommissionResult<Withdrawal> {
        let user_id: UserId = sqlx::query_scalar("SELECT user_id FROM withdrawals WHERE id = $1")
            .bind(withdrawal_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("withdrawal {}", withdrawal_id)))?;

        BalanceLedger::lock_in(&mut *conn, user_id).await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM withdrawals WHERE id = $1 FOR UPDATE",
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .fetch_one(&mut *conn)
        .await?;
        let withdrawal = row_to_withdrawal(&row)?;

        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(CommissionError::conflict(format!(
                "withdrawal {} is already {}",
                withdrawal_id, withdrawal.status
            )));
        }
        Ok(withdrawal)
    }

    async fn finish_in(
        conn: &mut PgConnection,
        pending: &Withdrawal,
        next: WithdrawalStatus,
        admin_id: AdminId,
        rejected_reason: Option<String>,
    ) -> CommissionResult<Withdrawal> {
        if !pending.status.can_transition_to(next) {
            return Err(CommissionError::conflict(format!(
                "withdrawal {} cannot move from {} to {}",
                pending.id, pending.status, next
            )));
        }

        // Status guard in WHERE keeps the update a compare-and-set
        let row = sqlx::query(&format!(
            r#"UPDATE withdrawals
               SET status = $2, approved_by = $3, approved_at = NOW(), rejected_reason = $4
               WHERE id = $1 AND status = $5
               RETURNING {}"#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(pending.id)
        .bind(next.id())
        .bind(admin_id)
        .bind(rejected_reason)
        .bind(pending.status.id())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            CommissionError::conflict(format!("withdrawal {} changed concurrently", pending.id))
        })?;

        row_to_withdrawal(&row)
    }

    async fn fetch<'e, E>(
        executor: E,
        withdrawal_id: WithdrawalId,
    ) -> CommissionResult<Option<Withdrawal>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(&format!(
            "SELECT {} FROM withdrawals WHERE id = $1",
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(row_to_withdrawal).transpose()
    }
}

fn check_amount(config: &CommissionConfig, amount: Decimal) -> CommissionResult<()> {
    money::check_amount("withdrawal amount", amount, config.currency_scale)?;
    if amount < config.min_withdrawal {
        return Err(CommissionError::invalid(format!(
            "withdrawal amount {} below minimum {}",
            amount, config.min_withdrawal
        )));
    }
    Ok(())
}

fn row_to_withdrawal(row: &PgRow) -> CommissionResult<Withdrawal> {
    let status_id: i16 = row.try_get("status")?;
    let status = WithdrawalStatus::from_id(status_id).ok_or_else(|| {
        CommissionError::Storage(format!("Invalid withdrawal status: {}", status_id))
    })?;

    Ok(Withdrawal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        status,
        bank: BankInfo {
            bank_name: row.try_get("bank_name")?,
            bank_account: row.try_get("bank_account")?,
            account_name: row.try_get("account_name")?,
        },
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        rejected_reason: row.try_get("rejected_reason")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_amount() {
        let config = CommissionConfig {
            min_withdrawal: Decimal::TEN,
            ..CommissionConfig::default()
        };

        assert!(check_amount(&config, Decimal::new(1050, 2)).is_ok());
        assert!(check_amount(&config, Decimal::TEN).is_ok());
        for bad in [
            Decimal::ZERO,
            Decimal::NEGATIVE_ONE,
            Decimal::new(999, 2),
            Decimal::new(10001, 3),
            money::MAX_AMOUNT,
        ] {
            assert!(
                matches!(check_amount(&config, bad), Err(CommissionError::InvalidInput(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
