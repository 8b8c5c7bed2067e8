//! Distributor Directory
//!
//! Lookups, referrer chain traversal and typed field updates. The `*_in`
//! functions run on the caller's transaction so the reward calculator and the
//! upgrade paths can compose them.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};
use std::sync::Arc;

use super::chain::{ChainWalker, ReferrerChain};
use super::models::{Distributor, DistributorStatus, DistributorUpdate, NewDistributor};
use crate::config::CommissionConfig;
use crate::core_types::{BrandId, DistributorId, UserId};
use crate::db::Database;
use crate::error::{CommissionError, CommissionResult};

#[derive(Clone)]
pub struct DistributorDirectory {
    db: Database,
    config: Arc<CommissionConfig>,
}

impl DistributorDirectory {
    pub fn new(db: Database, config: Arc<CommissionConfig>) -> Self {
        Self { db, config }
    }

    pub async fn find_by_user(
        &self,
        user_id: UserId,
        brand_id: BrandId,
    ) -> CommissionResult<Distributor> {
        Self::fetch_by_user(self.db.pool(), user_id, brand_id)
            .await?
            .ok_or_else(|| {
                CommissionError::not_found(format!(
                    "distributor for user {} in brand {}",
                    user_id, brand_id
                ))
            })
    }

    pub async fn find_by_id(&self, distributor_id: DistributorId) -> CommissionResult<Distributor> {
        Self::fetch_by_id(self.db.pool(), distributor_id)
            .await?
            .ok_or_else(|| CommissionError::not_found(format!("distributor {}", distributor_id)))
    }

    /// Referrer chain starting at `distributor_id` (depth 1), nearest first.
    ///
    /// `max_depth` is additionally capped by `commission.max_chain_depth`.
    pub async fn walk_referrer_chain(
        &self,
        distributor_id: DistributorId,
        max_depth: usize,
    ) -> CommissionResult<ReferrerChain> {
        let depth = max_depth.min(self.config.max_chain_depth);
        let mut conn = self.db.pool().acquire().await?;
        Self::walk_in(&mut conn, distributor_id, depth).await
    }

    /// Direct subordinates, oldest first
    pub async fn list_subordinates(
        &self,
        distributor_id: DistributorId,
    ) -> CommissionResult<Vec<Distributor>> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, brand_id, referrer_id, level, status,
                      total_earnings, subordinates_count, created_at, updated_at
               FROM distributors WHERE referrer_id = $1 ORDER BY id ASC"#,
        )
        .bind(distributor_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_distributor).collect()
    }

    pub async fn update_level(
        &self,
        distributor_id: DistributorId,
        level: i32,
    ) -> CommissionResult<Distributor> {
        self.update(distributor_id, DistributorUpdate::level(level)).await
    }

    pub async fn update_status(
        &self,
        distributor_id: DistributorId,
        status: DistributorStatus,
    ) -> CommissionResult<Distributor> {
        self.update(distributor_id, DistributorUpdate::status(status)).await
    }

    /// Apply a partial update in one statement
    pub async fn update(
        &self,
        distributor_id: DistributorId,
        update: DistributorUpdate,
    ) -> CommissionResult<Distributor> {
        if update.is_empty() {
            return Err(CommissionError::invalid("update has no fields"));
        }
        if let Some(level) = update.level
            && !self.config.is_allowed_level(level)
        {
            return Err(CommissionError::invalid(format!(
                "level {} is not one of {:?}",
                level, self.config.allowed_levels
            )));
        }

        let row = sqlx::query(
            r#"UPDATE distributors
               SET level = COALESCE($2, level),
                   status = COALESCE($3, status),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, user_id, brand_id, referrer_id, level, status,
                         total_earnings, subordinates_count, created_at, updated_at"#,
        )
        .bind(distributor_id)
        .bind(update.level)
        .bind(update.status.map(|s| s.id()))
        .fetch_optional(self.db.pool())
        .await?;

        let distributor = match row {
            Some(row) => row_to_distributor(&row)?,
            None => {
                return Err(CommissionError::not_found(format!(
                    "distributor {}",
                    distributor_id
                )));
            }
        };

        tracing::info!(
            distributor_id = distributor_id,
            level = ?update.level,
            status = ?update.status,
            "Distributor updated"
        );
        Ok(distributor)
    }

    pub async fn increment_subordinate_count(
        &self,
        distributor_id: DistributorId,
        delta: i64,
    ) -> CommissionResult<Distributor> {
        let pool = self.db.pool();
        let row = sqlx::query(
            r#"UPDATE distributors
               SET subordinates_count = subordinates_count + $2, updated_at = NOW()
               WHERE id = $1 AND subordinates_count + $2 >= 0
               RETURNING id, user_id, brand_id, referrer_id, level, status,
                         total_earnings, subordinates_count, created_at, updated_at"#,
        )
        .bind(distributor_id)
        .bind(delta)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => row_to_distributor(&row),
            None => match Self::fetch_by_id(pool, distributor_id).await? {
                Some(_) => Err(CommissionError::invalid(format!(
                    "subordinate count of distributor {} cannot go below zero",
                    distributor_id
                ))),
                None => Err(CommissionError::not_found(format!(
                    "distributor {}",
                    distributor_id
                ))),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Transaction-scoped building blocks
    // ------------------------------------------------------------------------

    pub(crate) async fn fetch_by_id<'e, E>(
        executor: E,
        distributor_id: DistributorId,
    ) -> CommissionResult<Option<Distributor>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"SELECT id, user_id, brand_id, referrer_id, level, status,
                      total_earnings, subordinates_count, created_at, updated_at
               FROM distributors WHERE id = $1"#,
        )
        .bind(distributor_id)
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(row_to_distributor).transpose()
    }

    pub(crate) async fn fetch_by_user<'e, E>(
        executor: E,
        user_id: UserId,
        brand_id: BrandId,
    ) -> CommissionResult<Option<Distributor>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"SELECT id, user_id, brand_id, referrer_id, level, status,
                      total_earnings, subordinates_count, created_at, updated_at
               FROM distributors WHERE user_id = $1 AND brand_id = $2"#,
        )
        .bind(user_id)
        .bind(brand_id)
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(row_to_distributor).transpose()
    }

    pub(crate) async fn walk_in(
        conn: &mut PgConnection,
        distributor_id: DistributorId,
        max_depth: usize,
    ) -> CommissionResult<ReferrerChain> {
        let mut walker = ChainWalker::new(distributor_id, max_depth);
        while let Some(id) = walker.pending() {
            let found = Self::fetch_by_id(&mut *conn, id).await?;
            walker.visit(found);
        }
        Ok(walker.finish())
    }

    pub(crate) async fn add_earnings_in(
        conn: &mut PgConnection,
        distributor_id: DistributorId,
        amount: Decimal,
    ) -> CommissionResult<()> {
        let result = sqlx::query(
            r#"UPDATE distributors
               SET total_earnings = total_earnings + $2, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(distributor_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CommissionError::not_found(format!(
                "distributor {}",
                distributor_id
            )));
        }
        Ok(())
    }

    /// Create a distributor unless one exists for (user, brand).
    ///
    /// Returns the distributor and whether this call created it. The candidate
    /// referrer is kept only if it exists, is active, belongs to the same brand
    /// and is not the user's own record; it gains one subordinate on creation.
    /// The `(user_id, brand_id)` unique key makes concurrent calls converge on
    /// one row.
    pub(crate) async fn enroll_in(
        conn: &mut PgConnection,
        new: NewDistributor,
    ) -> CommissionResult<(Distributor, bool)> {
        if let Some(existing) = Self::fetch_by_user(&mut *conn, new.user_id, new.brand_id).await? {
            return Ok((existing, false));
        }

        let referrer_id = match new.referrer_id {
            Some(id) => Self::eligible_referrer(&mut *conn, id, &new).await?,
            None => None,
        };

        let row = sqlx::query(
            r#"INSERT INTO distributors (user_id, brand_id, referrer_id, level, status)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (user_id, brand_id) DO NOTHING
               RETURNING id, user_id, brand_id, referrer_id, level, status,
                         total_earnings, subordinates_count, created_at, updated_at"#,
        )
        .bind(new.user_id)
        .bind(new.brand_id)
        .bind(referrer_id)
        .bind(new.level)
        .bind(DistributorStatus::Active.id())
        .fetch_optional(&mut *conn)
        .await?;

        let created = match row {
            Some(row) => row_to_distributor(&row)?,
            None => {
                // lost the race to a concurrent enrolment, which has committed by now
                let existing = Self::fetch_by_user(&mut *conn, new.user_id, new.brand_id)
                    .await?
                    .ok_or_else(|| {
                        CommissionError::Storage(format!(
                            "distributor for user {} vanished after conflict",
                            new.user_id
                        ))
                    })?;
                return Ok((existing, false));
            }
        };

        if let Some(referrer_id) = referrer_id {
            sqlx::query(
                r#"UPDATE distributors
                   SET subordinates_count = subordinates_count + 1, updated_at = NOW()
                   WHERE id = $1"#,
            )
            .bind(referrer_id)
            .execute(&mut *conn)
            .await?;
        }

        tracing::info!(
            distributor_id = created.id,
            user_id = created.user_id,
            brand_id = created.brand_id,
            referrer_id = ?created.referrer_id,
            level = created.level,
            "Distributor created"
        );
        Ok((created, true))
    }

    async fn eligible_referrer(
        conn: &mut PgConnection,
        referrer_id: DistributorId,
        new: &NewDistributor,
    ) -> CommissionResult<Option<DistributorId>> {
        let referrer = Self::fetch_by_id(&mut *conn, referrer_id).await?;
        let reason = match &referrer {
            None => "not found",
            Some(r) if !r.is_active() => "disabled",
            Some(r) if r.brand_id != new.brand_id => "different brand",
            Some(r) if r.user_id == new.user_id => "self referral",
            Some(_) => return Ok(Some(referrer_id)),
        };

        tracing::warn!(
            user_id = new.user_id,
            referrer_id = referrer_id,
            reason = reason,
            "Referrer rejected - distributor created without referrer"
        );
        Ok(None)
    }
}

pub(crate) fn row_to_distributor(row: &PgRow) -> CommissionResult<Distributor> {
    let status_id: i16 = row.try_get("status")?;
    let status = DistributorStatus::from_id(status_id)
        .ok_or_else(|| CommissionError::Storage(format!("Invalid distributor status: {}", status_id)))?;

    Ok(Distributor {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        brand_id: row.try_get("brand_id")?,
        referrer_id: row.try_get("referrer_id")?,
        level: row.try_get("level")?,
        status,
        total_earnings: row.try_get("total_earnings")?,
        subordinates_count: row.try_get("subordinates_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
