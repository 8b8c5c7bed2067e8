//! PostgreSQL schema for the commission engine
//!
//! Status columns are SMALLINT ids; see the `id()` / `from_id()` pairs on the
//! status enums. Money columns are NUMERIC(20, 8).

/// Idempotent DDL, applied at startup.
///
/// Sent as one simple-query batch, which Postgres runs as a single implicit
/// transaction; the advisory lock serializes instances starting together.
pub const SCHEMA: &str = r#"
SELECT pg_advisory_xact_lock(7301451);

CREATE TABLE IF NOT EXISTS distributors (
    id                  BIGSERIAL PRIMARY KEY,
    user_id             BIGINT NOT NULL,
    brand_id            BIGINT NOT NULL,
    referrer_id         BIGINT REFERENCES distributors (id),
    level               INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
    status              SMALLINT NOT NULL DEFAULT 1,
    total_earnings      NUMERIC(20, 8) NOT NULL DEFAULT 0,
    subordinates_count  BIGINT NOT NULL DEFAULT 0 CHECK (subordinates_count >= 0),
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT distributors_user_brand_key UNIQUE (user_id, brand_id)
);

CREATE INDEX IF NOT EXISTS distributors_referrer_idx ON distributors (referrer_id);

CREATE TABLE IF NOT EXISTS distributor_level_rewards (
    brand_id      BIGINT NOT NULL,
    level         INTEGER NOT NULL CHECK (level >= 1),
    reward_type   SMALLINT NOT NULL,
    reward_value  NUMERIC(20, 8) NOT NULL CHECK (reward_value >= 0),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (brand_id, level)
);

CREATE TABLE IF NOT EXISTS reward_distributions (
    order_id       BIGINT PRIMARY KEY,
    brand_id       BIGINT NOT NULL,
    buyer_user_id  BIGINT NOT NULL,
    order_amount   NUMERIC(20, 8) NOT NULL,
    reward_count   INTEGER NOT NULL,
    total_amount   NUMERIC(20, 8) NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS rewards (
    id              BIGSERIAL PRIMARY KEY,
    order_id        BIGINT NOT NULL,
    distributor_id  BIGINT NOT NULL REFERENCES distributors (id),
    level           INTEGER NOT NULL CHECK (level >= 1),
    amount          NUMERIC(20, 8) NOT NULL CHECK (amount > 0),
    status          SMALLINT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    settled_at      TIMESTAMPTZ,
    CONSTRAINT rewards_order_distributor_key UNIQUE (order_id, distributor_id)
);

CREATE INDEX IF NOT EXISTS rewards_distributor_idx ON rewards (distributor_id);

CREATE TABLE IF NOT EXISTS user_balances (
    user_id     BIGINT PRIMARY KEY,
    balance     NUMERIC(20, 8) NOT NULL DEFAULT 0 CHECK (balance >= 0),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS withdrawals (
    id               BIGSERIAL PRIMARY KEY,
    user_id          BIGINT NOT NULL,
    amount           NUMERIC(20, 8) NOT NULL CHECK (amount > 0),
    status           SMALLINT NOT NULL,
    bank_name        VARCHAR(128) NOT NULL,
    bank_account     VARCHAR(64) NOT NULL,
    account_name     VARCHAR(128) NOT NULL,
    approved_by      BIGINT,
    approved_at      TIMESTAMPTZ,
    rejected_reason  TEXT,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS withdrawals_user_idx ON withdrawals (user_id, created_at DESC);

-- At most one pending (status = 0) withdrawal per user
CREATE UNIQUE INDEX IF NOT EXISTS withdrawals_one_pending_per_user
    ON withdrawals (user_id) WHERE status = 0;

CREATE TABLE IF NOT EXISTS distributor_applications (
    id               BIGSERIAL PRIMARY KEY,
    user_id          BIGINT NOT NULL,
    brand_id         BIGINT NOT NULL,
    referrer_id      BIGINT REFERENCES distributors (id),
    reason           TEXT NOT NULL,
    status           SMALLINT NOT NULL,
    reviewed_by      BIGINT,
    reviewed_at      TIMESTAMPTZ,
    rejected_reason  TEXT,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- At most one pending (status = 0) application per user and brand
CREATE UNIQUE INDEX IF NOT EXISTS distributor_applications_one_pending
    ON distributor_applications (user_id, brand_id) WHERE status = 0;
"#;

/// Name of the partial unique index guarding pending withdrawals
pub const PENDING_WITHDRAWAL_INDEX: &str = "withdrawals_one_pending_per_user";

/// Name of the partial unique index guarding pending applications
pub const PENDING_APPLICATION_INDEX: &str = "distributor_applications_one_pending";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_every_table() {
        for table in [
            "distributors",
            "distributor_level_rewards",
            "reward_distributions",
            "rewards",
            "user_balances",
            "withdrawals",
            "distributor_applications",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
    }

    #[test]
    fn test_schema_declares_guard_indexes() {
        assert!(SCHEMA.contains(PENDING_WITHDRAWAL_INDEX));
        assert!(SCHEMA.contains(PENDING_APPLICATION_INDEX));
        assert!(SCHEMA.contains("UNIQUE (order_id, distributor_id)"));
        assert!(SCHEMA.contains("CHECK (balance >= 0)"));
    }
}
