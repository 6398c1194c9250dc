//! Initial database migration.
//!
//! Creates the org, membership, account, transaction, price, budget and
//! invite tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ORGS & MEMBERSHIP
        // ============================================================
        db.execute_unprepared(ORGS_SQL).await?;
        db.execute_unprepared(USER_ORGS_SQL).await?;
        db.execute_unprepared(INVITES_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(PERMISSIONS_SQL).await?;

        // ============================================================
        // PART 3: TRANSACTIONS & SPLITS
        // ============================================================
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(SPLITS_SQL).await?;

        // ============================================================
        // PART 4: PRICES & BUDGETS
        // ============================================================
        db.execute_unprepared(PRICES_SQL).await?;
        db.execute_unprepared(BUDGET_ITEMS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ORGS_SQL: &str = r"
CREATE TABLE orgs (
    id UUID PRIMARY KEY,
    inserted TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ NOT NULL,
    name VARCHAR(255) NOT NULL,
    currency VARCHAR(16) NOT NULL,
    precision INTEGER NOT NULL CHECK (precision >= 0),
    timezone VARCHAR(64) NOT NULL DEFAULT 'UTC'
);
";

const USER_ORGS_SQL: &str = r"
CREATE TABLE user_orgs (
    user_id UUID NOT NULL,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    admin BOOLEAN NOT NULL DEFAULT false,
    inserted TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (user_id, org_id)
);

CREATE INDEX idx_user_orgs_org ON user_orgs(org_id);
";

const INVITES_SQL: &str = r"
CREATE TABLE invites (
    id VARCHAR(32) PRIMARY KEY,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    inserted TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ NOT NULL,
    email VARCHAR(255) NOT NULL,
    accepted BOOLEAN NOT NULL DEFAULT false
);

CREATE INDEX idx_invites_org ON invites(org_id);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    inserted TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ NOT NULL,
    name VARCHAR(255) NOT NULL,
    parent_id UUID,
    currency VARCHAR(16) NOT NULL,
    precision INTEGER NOT NULL CHECK (precision >= 0),
    debit_balance BOOLEAN NOT NULL
);

CREATE INDEX idx_accounts_org ON accounts(org_id);
CREATE INDEX idx_accounts_parent ON accounts(parent_id);
";

const PERMISSIONS_SQL: &str = r"
CREATE TABLE permissions (
    user_id UUID NOT NULL,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    inserted TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (user_id, org_id, account_id)
);
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    user_id UUID NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    inserted TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    data TEXT NOT NULL DEFAULT '',
    deleted BOOLEAN NOT NULL DEFAULT false
);

CREATE INDEX idx_transactions_org_date ON transactions(org_id, date DESC);
";

const SPLITS_SQL: &str = r"
CREATE TABLE splits (
    id BIGSERIAL PRIMARY KEY,
    transaction_id UUID NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    account_id UUID NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    inserted TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ NOT NULL,
    amount BIGINT NOT NULL,
    native_amount BIGINT NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT false
);
";

const PRICES_SQL: &str = r"
CREATE TABLE prices (
    id UUID PRIMARY KEY,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    currency VARCHAR(16) NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    inserted TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ NOT NULL,
    price DOUBLE PRECISION NOT NULL CHECK (price > 0)
);

CREATE INDEX idx_prices_org_currency_date ON prices(org_id, currency, date);
";

const BUDGET_ITEMS_SQL: &str = r"
CREATE TABLE budget_items (
    id BIGSERIAL PRIMARY KEY,
    org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    account_id UUID NOT NULL,
    inserted TIMESTAMPTZ NOT NULL,
    amount BIGINT NOT NULL
);

CREATE INDEX idx_budget_items_org ON budget_items(org_id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS budget_items CASCADE;
DROP TABLE IF EXISTS prices CASCADE;
DROP TABLE IF EXISTS splits CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;
DROP TABLE IF EXISTS permissions CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TABLE IF EXISTS invites CASCADE;
DROP TABLE IF EXISTS user_orgs CASCADE;
DROP TABLE IF EXISTS orgs CASCADE;
";
