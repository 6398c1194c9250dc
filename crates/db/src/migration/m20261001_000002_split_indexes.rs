//! Indexes backing balance aggregation and per-account listing.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SPLIT_INDEXES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
DROP INDEX IF EXISTS idx_splits_account_active;
DROP INDEX IF EXISTS idx_splits_transaction;
",
        )
        .await?;
        Ok(())
    }
}

const SPLIT_INDEXES_SQL: &str = r"
CREATE INDEX idx_splits_account_active ON splits(account_id, deleted, date);
CREATE INDEX idx_splits_transaction ON splits(transaction_id);
";
