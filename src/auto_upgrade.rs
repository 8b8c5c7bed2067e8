//! Auto-Upgrade Evaluator
//!
//! Promotes a purchasing user into a distributor of the brand. The whole
//! check-and-create is one transaction and converges on a single row under
//! concurrent calls (unique `(user_id, brand_id)`).

use std::sync::Arc;

use crate::config::CommissionConfig;
use crate::core_types::{BrandId, DistributorId, OrderId, UserId};
use crate::db::Database;
use crate::distributor::{Distributor, DistributorDirectory, NewDistributor};
use crate::error::CommissionResult;

#[derive(Clone)]
pub struct AutoUpgradeEvaluator {
    db: Database,
    config: Arc<CommissionConfig>,
}

impl AutoUpgradeEvaluator {
    pub fn new(db: Database, config: Arc<CommissionConfig>) -> Self {
        Self { db, config }
    }

    /// Return the user's distributor record for the brand, creating it if needed.
    ///
    /// With auto-upgrade disabled only the lookup runs, so a user who is not
    /// yet a distributor gets `None`.
    pub async fn check_and_auto_upgrade(
        &self,
        user_id: UserId,
        brand_id: BrandId,
        order_id: OrderId,
        referrer_id: Option<DistributorId>,
    ) -> CommissionResult<Option<Distributor>> {
        if !self.config.auto_upgrade_enabled {
            return DistributorDirectory::fetch_by_user(self.db.pool(), user_id, brand_id).await;
        }

        let new = upgrade_target(&self.config, user_id, brand_id, referrer_id);
        let (distributor, created) = self
            .db
            .transaction(move |conn| {
                Box::pin(async move { DistributorDirectory::enroll_in(conn, new).await })
            })
            .await?;

        if created {
            tracing::info!(
                order_id = order_id,
                user_id = user_id,
                brand_id = brand_id,
                distributor_id = distributor.id,
                "User auto-upgraded to distributor"
            );
        }
        Ok(Some(distributor))
    }
}

/// Distributor record a purchase would create
fn upgrade_target(
    config: &CommissionConfig,
    user_id: UserId,
    brand_id: BrandId,
    referrer_id: Option<DistributorId>,
) -> NewDistributor {
    NewDistributor {
        user_id,
        brand_id,
        referrer_id,
        level: config.entry_level,
    }
}
