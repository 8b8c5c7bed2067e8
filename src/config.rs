use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL (overridden by `DATABASE_URL`)
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Server-side `statement_timeout`; 0 disables it
    pub statement_timeout_ms: u64,
    /// Upper bound for one engine operation, transaction included
    pub operation_deadline_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            acquire_timeout_ms: 5_000,
            statement_timeout_ms: 5_000,
            operation_deadline_ms: 10_000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn operation_deadline(&self) -> Duration {
        Duration::from_millis(self.operation_deadline_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CommissionConfig {
    /// Distributor level assigned on auto-upgrade and application approval
    pub entry_level: i32,
    /// Levels a distributor may be set to
    pub allowed_levels: Vec<i32>,
    /// Hard cap on referrer chain traversal, whatever the brand configures
    pub max_chain_depth: usize,
    /// Decimal places of the currency's smallest unit (2 = cents)
    pub currency_scale: u32,
    pub min_withdrawal: Decimal,
    /// Credit balances when the order is paid; otherwise rewards stay pending
    pub settle_on_payment: bool,
    pub auto_upgrade_enabled: bool,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            entry_level: 1,
            allowed_levels: vec![1, 2, 3],
            max_chain_depth: 10,
            currency_scale: 2,
            min_withdrawal: Decimal::ONE,
            settle_on_payment: true,
            auto_upgrade_enabled: true,
        }
    }
}

impl CommissionConfig {
    pub fn is_allowed_level(&self, level: i32) -> bool {
        self.allowed_levels.contains(&level)
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", config_path))?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.postgres_url = Some(url);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let c = &self.commission;
        anyhow::ensure!(
            c.is_allowed_level(c.entry_level),
            "commission.entry_level {} is not in allowed_levels {:?}",
            c.entry_level,
            c.allowed_levels
        );
        anyhow::ensure!(c.max_chain_depth > 0, "commission.max_chain_depth must be > 0");
        anyhow::ensure!(
            c.min_withdrawal >= Decimal::ZERO,
            "commission.min_withdrawal must not be negative"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: commission.log
use_json: false
rotation: daily
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(config.postgres_url.is_none());
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.commission.entry_level, 1);
        assert_eq!(config.commission.currency_scale, 2);
        assert!(config.commission.settle_on_payment);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_commission_section() {
        let yaml = format!(
            "{}commission:\n  min_withdrawal: \"10.5\"\n  allowed_levels: [1, 2]\n",
            MINIMAL
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.commission.min_withdrawal, Decimal::new(105, 1));
        assert_eq!(config.commission.allowed_levels, vec![1, 2]);
        // untouched fields keep their defaults
        assert_eq!(config.commission.max_chain_depth, 10);
        assert!(config.commission.is_allowed_level(2));
        assert!(!config.commission.is_allowed_level(3));
    }

    #[test]
    fn test_entry_level_must_be_allowed() {
        let yaml = format!(
            "{}commission:\n  entry_level: 5\n  allowed_levels: [1, 2]\n",
            MINIMAL
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_configs_parse() {
        for yaml in [
            include_str!("../config/dev.yaml"),
            include_str!("../config/prod.yaml"),
        ] {
            let config = AppConfig::from_yaml(yaml).unwrap();
            assert!(config.validate().is_ok());
        }
    }
}
