//! Multi-Level Reward Calculator
//!
//! One paid order -> one transaction: idempotency claim, chain walk, reward
//! rows, balance credits and earnings accrual commit together or not at all.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};
use std::sync::Arc;

use super::models::{DistributionOutcome, Reward, RewardRequest, RewardStatus};
use super::plan::{PlannedReward, credit_order, plan_rewards, total_amount, walk_depth};
use crate::config::CommissionConfig;
use crate::core_types::{DistributorId, OrderId, UserId};
use crate::db::Database;
use crate::distributor::DistributorDirectory;
use crate::error::{CommissionError, CommissionResult};
use crate::ledger::BalanceLedger;
use crate::level_config::LevelRewardStore;

#[derive(Clone)]
pub struct RewardCalculator {
    db: Database,
    config: Arc<CommissionConfig>,
}

impl RewardCalculator {
    pub fn new(db: Database, config: Arc<CommissionConfig>) -> Self {
        Self { db, config }
    }

    /// Distribute commissions for a paid order.
    ///
    /// Safe to call again with the same `order_id`: later calls observe the
    /// existing distribution and write nothing. "No referrer" and "no rule at
    /// this level" end the distribution normally.
    pub async fn calculate_and_distribute_rewards(
        &self,
        req: RewardRequest,
    ) -> CommissionResult<DistributionOutcome> {
        req.validate()?;

        let order_id = req.order_id;
        let scale = self.config.currency_scale;
        let max_chain_depth = self.config.max_chain_depth;
        let settle = self.config.settle_on_payment;

        let outcome = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    Self::distribute_in(conn, req, scale, max_chain_depth, settle).await
                })
            })
            .await?;

        match &outcome {
            DistributionOutcome::Distributed { rewards, total } => tracing::info!(
                order_id = order_id,
                rewards = rewards.len(),
                total = %total,
                settled = settle,
                "Order rewards distributed"
            ),
            DistributionOutcome::AlreadyDistributed => {
                tracing::info!(order_id = order_id, "Order already distributed - skipped")
            }
            other => tracing::debug!(order_id = order_id, outcome = ?other, "No rewards for order"),
        }
        Ok(outcome)
    }

    /// Settle every pending reward of an order: mark settled, credit balances,
    /// accrue earnings. Returns the rewards settled by this call.
    pub async fn settle_order_rewards(&self, order_id: OrderId) -> CommissionResult<Vec<Reward>> {
        let settled = self
            .db
            .transaction(move |conn| {
                Box::pin(async move { Self::settle_in(conn, order_id).await })
            })
            .await?;

        if !settled.is_empty() {
            tracing::info!(order_id = order_id, rewards = settled.len(), "Pending rewards settled");
        }
        Ok(settled)
    }

    pub async fn list_rewards_by_order(&self, order_id: OrderId) -> CommissionResult<Vec<Reward>> {
        Self::fetch_by_order(self.db.pool(), order_id).await
    }

    pub async fn list_rewards_by_distributor(
        &self,
        distributor_id: DistributorId,
    ) -> CommissionResult<Vec<Reward>> {
        let rows = sqlx::query(
            r#"SELECT id, order_id, distributor_id, level, amount, status, created_at, settled_at
               FROM rewards WHERE distributor_id = $1
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(distributor_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_reward).collect()
    }

    async fn distribute_in(
        conn: &mut PgConnection,
        req: RewardRequest,
        scale: u32,
        max_chain_depth: usize,
        settle: bool,
    ) -> CommissionResult<DistributionOutcome> {
        // 1. Fast idempotency check; the claim below is the authoritative one
        if Self::is_distributed(&mut *conn, req.order_id).await? {
            return Ok(DistributionOutcome::AlreadyDistributed);
        }

        // 2. Resolve the direct referrer
        let Some(referrer_id) = req.referrer_id else {
            return Ok(DistributionOutcome::NoReferrer);
        };
        let referrer = match DistributorDirectory::fetch_by_id(&mut *conn, referrer_id).await? {
            Some(r) if r.is_active() && r.brand_id == req.brand_id => r,
            Some(r) => {
                tracing::warn!(
                    order_id = req.order_id,
                    distributor_id = r.id,
                    status = %r.status,
                    brand_id = r.brand_id,
                    "Referrer not eligible - no rewards"
                );
                return Ok(DistributionOutcome::NoReferrer);
            }
            None => return Ok(DistributionOutcome::NoReferrer),
        };

        // 3. Walk, bounded by the brand's configured levels
        let rules = LevelRewardStore::fetch_rules(&mut *conn, req.brand_id).await?;
        let depth = walk_depth(&rules, req.start_level).min(max_chain_depth);
        let chain = DistributorDirectory::walk_in(&mut *conn, referrer.id, depth).await?;

        // 4. Decide amounts
        let planned = plan_rewards(&chain.members, &rules, &req, scale);
        if planned.is_empty() {
            return Ok(DistributionOutcome::NothingToDistribute);
        }
        let total = total_amount(&planned);

        // 5. Claim the order; blocks behind a concurrent claim until it resolves
        if !Self::claim_in(&mut *conn, &req, planned.len(), total).await? {
            return Ok(DistributionOutcome::AlreadyDistributed);
        }

        let mut rewards = Vec::with_capacity(planned.len());
        for p in &planned {
            rewards.push(Self::record_in(&mut *conn, req.order_id, p, settle).await?);
        }
        if settle {
            for p in credit_order(&planned) {
                Self::credit_in(&mut *conn, p.distributor_id, p.user_id, p.amount).await?;
            }
        }

        Ok(DistributionOutcome::Distributed { rewards, total })
    }

    async fn is_distributed<'e, E>(executor: E, order_id: OrderId) -> CommissionResult<bool>
    where
        E: PgExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM reward_distributions WHERE order_id = $1)
                   OR EXISTS (SELECT 1 FROM rewards WHERE order_id = $1)"#,
        )
        .bind(order_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    /// Insert the per-order header. `false` when another call already owns it.
    async fn claim_in(
        conn: &mut PgConnection,
        req: &RewardRequest,
        reward_count: usize,
        total: Decimal,
    ) -> CommissionResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO reward_distributions
                   (order_id, brand_id, buyer_user_id, order_amount, reward_count, total_amount)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (order_id) DO NOTHING"#,
        )
        .bind(req.order_id)
        .bind(req.brand_id)
        .bind(req.buyer_user_id)
        .bind(req.order_amount)
        .bind(reward_count as i32)
        .bind(total)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Write one reward row. Settled rows are credited separately, see [`credit_order`].
    async fn record_in(
        conn: &mut PgConnection,
        order_id: OrderId,
        planned: &PlannedReward,
        settle: bool,
    ) -> CommissionResult<Reward> {
        let status = if settle {
            RewardStatus::Settled
        } else {
            RewardStatus::Pending
        };

        let row = sqlx::query(
            r#"INSERT INTO rewards (order_id, distributor_id, level, amount, status, settled_at)
               VALUES ($1, $2, $3, $4, $5, CASE WHEN $6 THEN NOW() END)
               RETURNING id, order_id, distributor_id, level, amount, status, created_at, settled_at"#,
        )
        .bind(order_id)
        .bind(planned.distributor_id)
        .bind(planned.level)
        .bind(planned.amount)
        .bind(status.id())
        .bind(settle)
        .fetch_one(&mut *conn)
        .await?;
        let reward = row_to_reward(&row)?;

        tracing::debug!(
            order_id = order_id,
            distributor_id = planned.distributor_id,
            level = planned.level,
            amount = %planned.amount,
            status = %status,
            "Reward recorded"
        );
        Ok(reward)
    }

    async fn settle_in(conn: &mut PgConnection, order_id: OrderId) -> CommissionResult<Vec<Reward>> {
        // CAS on status: concurrent settlers each get a disjoint set of rows
        let rows = sqlx::query(
            r#"UPDATE rewards SET status = $2, settled_at = NOW()
               WHERE order_id = $1 AND status = $3
               RETURNING id, order_id, distributor_id, level, amount, status, created_at, settled_at"#,
        )
        .bind(order_id)
        .bind(RewardStatus::Settled.id())
        .bind(RewardStatus::Pending.id())
        .fetch_all(&mut *conn)
        .await?;

        let mut settled = Vec::with_capacity(rows.len());
        let mut credits = Vec::with_capacity(rows.len());
        for row in &rows {
            let reward = row_to_reward(row)?;
            let distributor = DistributorDirectory::fetch_by_id(&mut *conn, reward.distributor_id)
                .await?
                .ok_or_else(|| {
                    CommissionError::not_found(format!("distributor {}", reward.distributor_id))
                })?;
            credits.push(PlannedReward {
                distributor_id: distributor.id,
                user_id: distributor.user_id,
                level: reward.level,
                amount: reward.amount,
            });
            settled.push(reward);
        }

        for c in credit_order(&credits) {
            Self::credit_in(&mut *conn, c.distributor_id, c.user_id, c.amount).await?;
        }
        settled.sort_by_key(|r| r.level);
        Ok(settled)
    }

    async fn credit_in(
        conn: &mut PgConnection,
        distributor_id: DistributorId,
        user_id: UserId,
        amount: Decimal,
    ) -> CommissionResult<()> {
        BalanceLedger::credit_in(&mut *conn, user_id, amount).await?;
        DistributorDirectory::add_earnings_in(&mut *conn, distributor_id, amount).await
    }

    async fn fetch_by_order<'e, E>(executor: E, order_id: OrderId) -> CommissionResult<Vec<Reward>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            r#"SELECT id, order_id, distributor_id, level, amount, status, created_at, settled_at
               FROM rewards WHERE order_id = $1 ORDER BY level ASC"#,
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        rows.iter().map(row_to_reward).collect()
    }
}

fn row_to_reward(row: &PgRow) -> CommissionResult<Reward> {
    let status_id: i16 = row.try_get("status")?;
    let status = RewardStatus::from_id(status_id)
        .ok_or_else(|| CommissionError::Storage(format!("Invalid reward status: {}", status_id)))?;

    Ok(Reward {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        distributor_id: row.try_get("distributor_id")?,
        level: row.try_get("level")?,
        amount: row.try_get("amount")?,
        status,
        created_at: row.try_get("created_at")?,
        settled_at: row.try_get("settled_at")?,
    })
}
