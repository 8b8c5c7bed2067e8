//! Commission Engine - one handle over every component
//!
//! ```text
//! OrderPaidEvent ──▶ RewardCalculator (tx 1) ──▶ AutoUpgradeEvaluator (tx 2)
//! ```
//!
//! Each step commits on its own and is bounded by the configured operation
//! deadline. Both steps are idempotent, so a failed event can simply be
//! delivered again.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application::{ApplicationRequest, ApplicationService, DistributorApplication};
use crate::auto_upgrade::AutoUpgradeEvaluator;
use crate::config::{AppConfig, CommissionConfig};
use crate::core_types::{
    AdminId, ApplicationId, BrandId, DistributorId, OrderId, UserId, WithdrawalId,
};
use crate::db::{Database, with_deadline};
use crate::distributor::{
    Distributor, DistributorDirectory, DistributorStatus, DistributorUpdate, ReferrerChain,
};
use crate::error::CommissionResult;
use crate::ledger::BalanceLedger;
use crate::level_config::{LevelRewardRule, LevelRewardSetting, LevelRewardStore};
use crate::reward::{DistributionOutcome, Reward, RewardCalculator, RewardRequest};
use crate::withdrawal::{BankInfo, Withdrawal, WithdrawalService};

/// Order payment notification from the order system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order_id: OrderId,
    pub brand_id: BrandId,
    pub buyer_user_id: UserId,
    pub amount: Decimal,
    #[serde(default)]
    pub referrer_id: Option<DistributorId>,
}

impl OrderPaidEvent {
    /// Direct referrers sit at level 1
    pub fn reward_request(&self) -> RewardRequest {
        RewardRequest {
            order_id: self.order_id,
            brand_id: self.brand_id,
            buyer_user_id: self.buyer_user_id,
            start_level: 1,
            referrer_id: self.referrer_id,
            order_amount: self.amount,
        }
    }
}

/// What handling one order-paid event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPaidReport {
    pub distribution: DistributionOutcome,
    /// Buyer's distributor record after the upgrade check
    pub distributor: Option<Distributor>,
}

/// Consumer of order-paid events
#[async_trait]
pub trait OrderPaidHandler: Send + Sync {
    /// Must be idempotent per `order_id`
    async fn on_order_paid(&self, event: OrderPaidEvent) -> CommissionResult<OrderPaidReport>;
}

#[derive(Clone)]
pub struct CommissionEngine {
    config: Arc<CommissionConfig>,
    deadline: Duration,
    levels: LevelRewardStore,
    directory: DistributorDirectory,
    ledger: BalanceLedger,
    calculator: RewardCalculator,
    upgrader: AutoUpgradeEvaluator,
    withdrawals: WithdrawalService,
    applications: ApplicationService,
}

impl CommissionEngine {
    pub fn new(db: Database, app_config: &AppConfig) -> Self {
        let config = Arc::new(app_config.commission.clone());
        Self {
            deadline: app_config.database.operation_deadline(),
            levels: LevelRewardStore::new(db.clone()),
            directory: DistributorDirectory::new(db.clone(), config.clone()),
            ledger: BalanceLedger::new(db.clone()),
            calculator: RewardCalculator::new(db.clone(), config.clone()),
            upgrader: AutoUpgradeEvaluator::new(db.clone(), config.clone()),
            withdrawals: WithdrawalService::new(db.clone(), config.clone()),
            applications: ApplicationService::new(db, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &CommissionConfig {
        &self.config
    }

    async fn bounded<T>(&self, fut: impl Future<Output = CommissionResult<T>>) -> CommissionResult<T> {
        with_deadline(self.deadline, fut).await
    }

    // === Level configuration ===

    pub async fn get_level_rewards(&self, brand_id: BrandId) -> CommissionResult<Vec<LevelRewardRule>> {
        self.bounded(self.levels.get_level_rewards(brand_id)).await
    }

    pub async fn get_level_reward(
        &self,
        brand_id: BrandId,
        level: i32,
    ) -> CommissionResult<LevelRewardRule> {
        self.bounded(self.levels.get_level_reward(brand_id, level)).await
    }

    pub async fn set_level_rewards(
        &self,
        brand_id: BrandId,
        settings: Vec<LevelRewardSetting>,
    ) -> CommissionResult<Vec<LevelRewardRule>> {
        self.bounded(self.levels.set_level_rewards(brand_id, settings)).await
    }

    // === Distributors ===

    pub async fn find_distributor(
        &self,
        user_id: UserId,
        brand_id: BrandId,
    ) -> CommissionResult<Distributor> {
        self.bounded(self.directory.find_by_user(user_id, brand_id)).await
    }

    pub async fn get_distributor(&self, distributor_id: DistributorId) -> CommissionResult<Distributor> {
        self.bounded(self.directory.find_by_id(distributor_id)).await
    }

    pub async fn walk_referrer_chain(
        &self,
        distributor_id: DistributorId,
        max_depth: usize,
    ) -> CommissionResult<ReferrerChain> {
        self.bounded(self.directory.walk_referrer_chain(distributor_id, max_depth))
            .await
    }

    pub async fn list_subordinates(
        &self,
        distributor_id: DistributorId,
    ) -> CommissionResult<Vec<Distributor>> {
        self.bounded(self.directory.list_subordinates(distributor_id)).await
    }

    pub async fn update_distributor_level(
        &self,
        distributor_id: DistributorId,
        level: i32,
    ) -> CommissionResult<Distributor> {
        self.bounded(self.directory.update_level(distributor_id, level)).await
    }

    pub async fn update_distributor_status(
        &self,
        distributor_id: DistributorId,
        status: DistributorStatus,
    ) -> CommissionResult<Distributor> {
        self.bounded(self.directory.update_status(distributor_id, status)).await
    }

    pub async fn update_distributor(
        &self,
        distributor_id: DistributorId,
        update: DistributorUpdate,
    ) -> CommissionResult<Distributor> {
        self.bounded(self.directory.update(distributor_id, update)).await
    }

    pub async fn increment_subordinate_count(
        &self,
        distributor_id: DistributorId,
        delta: i64,
    ) -> CommissionResult<Distributor> {
        self.bounded(self.directory.increment_subordinate_count(distributor_id, delta))
            .await
    }

    // === Rewards ===

    pub async fn calculate_and_distribute_rewards(
        &self,
        req: RewardRequest,
    ) -> CommissionResult<DistributionOutcome> {
        self.bounded(self.calculator.calculate_and_distribute_rewards(req)).await
    }

    pub async fn settle_order_rewards(&self, order_id: OrderId) -> CommissionResult<Vec<Reward>> {
        self.bounded(self.calculator.settle_order_rewards(order_id)).await
    }

    pub async fn list_rewards_by_order(&self, order_id: OrderId) -> CommissionResult<Vec<Reward>> {
        self.bounded(self.calculator.list_rewards_by_order(order_id)).await
    }

    pub async fn list_rewards_by_distributor(
        &self,
        distributor_id: DistributorId,
    ) -> CommissionResult<Vec<Reward>> {
        self.bounded(self.calculator.list_rewards_by_distributor(distributor_id))
            .await
    }

    pub async fn check_and_auto_upgrade(
        &self,
        user_id: UserId,
        brand_id: BrandId,
        order_id: OrderId,
        referrer_id: Option<DistributorId>,
    ) -> CommissionResult<Option<Distributor>> {
        self.bounded(
            self.upgrader
                .check_and_auto_upgrade(user_id, brand_id, order_id, referrer_id),
        )
        .await
    }

    // === Balances and withdrawals ===

    pub async fn get_balance(&self, user_id: UserId) -> CommissionResult<Decimal> {
        self.bounded(self.ledger.get_balance(user_id)).await
    }

    pub async fn credit_balance(&self, user_id: UserId, amount: Decimal) -> CommissionResult<Decimal> {
        self.bounded(self.ledger.credit(user_id, amount)).await
    }

    pub async fn debit_balance(&self, user_id: UserId, amount: Decimal) -> CommissionResult<Decimal> {
        self.bounded(self.ledger.debit(user_id, amount)).await
    }

    pub async fn apply_withdrawal(
        &self,
        user_id: UserId,
        amount: Decimal,
        bank: BankInfo,
    ) -> CommissionResult<Withdrawal> {
        self.bounded(self.withdrawals.apply_withdrawal(user_id, amount, bank))
            .await
    }

    pub async fn approve_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        admin_id: AdminId,
    ) -> CommissionResult<Withdrawal> {
        self.bounded(self.withdrawals.approve_withdrawal(withdrawal_id, admin_id))
            .await
    }

    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        admin_id: AdminId,
        reason: &str,
    ) -> CommissionResult<Withdrawal> {
        self.bounded(
            self.withdrawals
                .reject_withdrawal(withdrawal_id, admin_id, reason),
        )
        .await
    }

    pub async fn get_withdrawal(&self, withdrawal_id: WithdrawalId) -> CommissionResult<Withdrawal> {
        self.bounded(self.withdrawals.get_withdrawal(withdrawal_id)).await
    }

    pub async fn list_withdrawals(&self, user_id: UserId) -> CommissionResult<Vec<Withdrawal>> {
        self.bounded(self.withdrawals.list_withdrawals(user_id)).await
    }

    // === Applications ===

    pub async fn apply_distributor(
        &self,
        req: ApplicationRequest,
    ) -> CommissionResult<DistributorApplication> {
        self.bounded(self.applications.apply(req)).await
    }

    pub async fn approve_application(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
    ) -> CommissionResult<(DistributorApplication, Distributor)> {
        self.bounded(self.applications.approve(application_id, admin_id))
            .await
    }

    pub async fn reject_application(
        &self,
        application_id: ApplicationId,
        admin_id: AdminId,
        reason: &str,
    ) -> CommissionResult<DistributorApplication> {
        self.bounded(self.applications.reject(application_id, admin_id, reason))
            .await
    }

    pub async fn get_application(
        &self,
        application_id: ApplicationId,
    ) -> CommissionResult<DistributorApplication> {
        self.bounded(self.applications.get(application_id)).await
    }
}

#[async_trait]
impl OrderPaidHandler for CommissionEngine {
    /// Rewards first, so the buyer's new record can never sit in its own
    /// chain for this order. A calculator failure skips the upgrade; the
    /// redelivered event runs both again.
    async fn on_order_paid(&self, event: OrderPaidEvent) -> CommissionResult<OrderPaidReport> {
        let distribution = self
            .calculate_and_distribute_rewards(event.reward_request())
            .await
            .inspect_err(|e| {
                tracing::error!(
                    order_id = event.order_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Reward distribution failed"
                )
            })?;

        let distributor = self
            .check_and_auto_upgrade(
                event.buyer_user_id,
                event.brand_id,
                event.order_id,
                event.referrer_id,
            )
            .await
            .inspect_err(|e| {
                tracing::error!(
                    order_id = event.order_id,
                    user_id = event.buyer_user_id,
                    error = %e,
                    "Auto-upgrade failed"
                )
            })?;

        Ok(OrderPaidReport {
            distribution,
            distributor,
        })
    }
}
