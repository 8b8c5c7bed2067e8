//! Level reward configuration store

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, Row};

use super::models::{LevelRewardRule, LevelRewardSetting, RewardType, validate_settings};
use crate::core_types::BrandId;
use crate::db::Database;
use crate::error::{CommissionError, CommissionResult};

/// Per-brand, per-level commission rules
#[derive(Clone)]
pub struct LevelRewardStore {
    db: Database,
}

impl LevelRewardStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All rules of a brand, ascending by level
    pub async fn get_level_rewards(
        &self,
        brand_id: BrandId,
    ) -> CommissionResult<Vec<LevelRewardRule>> {
        Self::fetch_rules(self.db.pool(), brand_id).await
    }

    /// Rule for one level; `NotFound` when the brand does not configure it
    pub async fn get_level_reward(
        &self,
        brand_id: BrandId,
        level: i32,
    ) -> CommissionResult<LevelRewardRule> {
        let row = sqlx::query(
            r#"SELECT brand_id, level, reward_type, reward_value
               FROM distributor_level_rewards WHERE brand_id = $1 AND level = $2"#,
        )
        .bind(brand_id)
        .bind(level)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => row_to_rule(&row),
            None => Err(CommissionError::not_found(format!(
                "level reward config for brand {} level {}",
                brand_id, level
            ))),
        }
    }

    /// Replace the brand's full rule set (delete-then-insert, one transaction)
    pub async fn set_level_rewards(
        &self,
        brand_id: BrandId,
        settings: Vec<LevelRewardSetting>,
    ) -> CommissionResult<Vec<LevelRewardRule>> {
        validate_settings(&settings)?;

        let mut rules: Vec<LevelRewardRule> =
            settings.into_iter().map(|s| s.into_rule(brand_id)).collect();
        rules.sort_by_key(|r| r.level);

        let stored = rules.clone();
        self.db
            .transaction(move |conn| {
                Box::pin(async move { Self::replace_rules(conn, brand_id, &stored).await })
            })
            .await?;

        tracing::info!(
            brand_id = brand_id,
            levels = rules.len(),
            "Level reward rules replaced"
        );
        Ok(rules)
    }

    pub(crate) async fn fetch_rules<'e, E>(
        executor: E,
        brand_id: BrandId,
    ) -> CommissionResult<Vec<LevelRewardRule>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            r#"SELECT brand_id, level, reward_type, reward_value
               FROM distributor_level_rewards WHERE brand_id = $1
               ORDER BY level ASC"#,
        )
        .bind(brand_id)
        .fetch_all(executor)
        .await?;

        rows.iter().map(row_to_rule).collect()
    }

    async fn replace_rules(
        conn: &mut PgConnection,
        brand_id: BrandId,
        rules: &[LevelRewardRule],
    ) -> CommissionResult<()> {
        sqlx::query("DELETE FROM distributor_level_rewards WHERE brand_id = $1")
            .bind(brand_id)
            .execute(&mut *conn)
            .await?;

        for rule in rules {
            sqlx::query(
                r#"INSERT INTO distributor_level_rewards (brand_id, level, reward_type, reward_value)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(brand_id)
            .bind(rule.level)
            .bind(rule.reward_type.id())
            .bind(rule.reward_value)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

fn row_to_rule(row: &PgRow) -> CommissionResult<LevelRewardRule> {
    let type_id: i16 = row.try_get("reward_type")?;
    let reward_type = RewardType::from_id(type_id)
        .ok_or_else(|| CommissionError::Storage(format!("Invalid reward_type: {}", type_id)))?;

    Ok(LevelRewardRule {
        brand_id: row.try_get("brand_id")?,
        level: row.try_get("level")?,
        reward_type,
        reward_value: row.try_get("reward_value")?,
    })
}
