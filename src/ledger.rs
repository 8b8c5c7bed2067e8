//! Balance Ledger - withdrawable balance per user
//!
//! `user_balances` is mutated ONLY through [`BalanceLedger::credit_in`] and
//! [`BalanceLedger::debit_in`]. Each is one atomic statement
//! (`balance = balance ± amount`), so concurrent credits and debits on the
//! same user cannot lose updates. The debit is guarded in the WHERE clause and
//! by `CHECK (balance >= 0)`.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};

use crate::core_types::UserId;
use crate::db::Database;
use crate::error::{CommissionError, CommissionResult};
use crate::money;

#[derive(Clone)]
pub struct BalanceLedger {
    db: Database,
}

impl BalanceLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Credit `amount` in its own transaction. Returns the new balance.
    pub async fn credit(&self, user_id: UserId, amount: Decimal) -> CommissionResult<Decimal> {
        self.db
            .transaction(move |conn| {
                Box::pin(async move { Self::credit_in(conn, user_id, amount).await })
            })
            .await
    }

    /// Debit `amount` in its own transaction. Returns the new balance.
    pub async fn debit(&self, user_id: UserId, amount: Decimal) -> CommissionResult<Decimal> {
        self.db
            .transaction(move |conn| {
                Box::pin(async move { Self::debit_in(conn, user_id, amount).await })
            })
            .await
    }

    /// Current balance; a user without a row has zero
    pub async fn get_balance(&self, user_id: UserId) -> CommissionResult<Decimal> {
        Self::fetch_balance(self.db.pool(), user_id).await
    }

    /// Credit inside the caller's transaction
    pub async fn credit_in(
        conn: &mut PgConnection,
        user_id: UserId,
        amount: Decimal,
    ) -> CommissionResult<Decimal> {
        ensure_positive(amount)?;

        let balance: Decimal = sqlx::query_scalar(
            r#"INSERT INTO user_balances (user_id, balance, updated_at)
               VALUES ($1, $2, NOW())
               ON CONFLICT (user_id)
               DO UPDATE SET balance = user_balances.balance + EXCLUDED.balance, updated_at = NOW()
               RETURNING balance"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(user_id = user_id, amount = %amount, balance = %balance, "Balance credited");
        Ok(balance)
    }

    /// Debit inside the caller's transaction.
    ///
    /// Fails with `InsufficientBalance` (and changes nothing) when the balance
    /// would go below zero, including when the user has no balance row.
    pub async fn debit_in(
        conn: &mut PgConnection,
        user_id: UserId,
        amount: Decimal,
    ) -> CommissionResult<Decimal> {
        ensure_positive(amount)?;

        let balance: Option<Decimal> = sqlx::query_scalar(
            r#"UPDATE user_balances
               SET balance = balance - $2, updated_at = NOW()
               WHERE user_id = $1 AND balance >= $2
               RETURNING balance"#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?;

        match balance {
            Some(balance) => {
                tracing::debug!(user_id = user_id, amount = %amount, balance = %balance, "Balance debited");
                Ok(balance)
            }
            None => Err(CommissionError::InsufficientBalance),
        }
    }

    /// Lock the user's balance row until the transaction ends.
    ///
    /// Creates a zero row first so that users without a balance serialize too.
    pub async fn lock_in(conn: &mut PgConnection, user_id: UserId) -> CommissionResult<Decimal> {
        sqlx::query(
            "INSERT INTO user_balances (user_id, balance) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        let balance: Decimal =
            sqlx::query_scalar("SELECT balance FROM user_balances WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(balance)
    }

    pub(crate) async fn fetch_balance<'e, E>(executor: E, user_id: UserId) -> CommissionResult<Decimal>
    where
        E: PgExecutor<'e>,
    {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM user_balances WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(executor)
                .await?;
        Ok(balance.unwrap_or(Decimal::ZERO))
    }
}

/// Positive, below the amount cap and storable without rounding
fn ensure_positive(amount: Decimal) -> CommissionResult<()> {
    money::check_amount("amount", amount, money::STORAGE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(Decimal::ONE).is_ok());
        assert!(ensure_positive(Decimal::new(1, 8)).is_ok());
        assert!(matches!(
            ensure_positive(Decimal::ZERO),
            Err(CommissionError::InvalidInput(_))
        ));
        assert!(ensure_positive(Decimal::NEGATIVE_ONE).is_err());
        // finer than the column scale would be rounded away by Postgres
        assert!(matches!(
            ensure_positive(Decimal::new(1, 9)),
            Err(CommissionError::InvalidInput(_))
        ));
        assert!(ensure_positive(money::MAX_AMOUNT).is_err());
    }
}
