//! Budget repository. An org's budget is the ordered set of its items.

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::budget_items;

/// Budget repository.
#[derive(Debug, Clone)]
pub struct BudgetRepository {
    db: DatabaseConnection,
}

impl BudgetRepository {
    /// Creates a new budget repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads an org's budget items in the order they were stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_org(&self, org_id: Uuid) -> Result<Vec<budget_items::Model>, DbErr> {
        budget_items::Entity::find()
            .filter(budget_items::Column::OrgId.eq(org_id))
            .order_by_asc(budget_items::Column::Id)
            .all(&self.db)
            .await
    }

    /// Replaces every item of an org's budget.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the old budget survives in
    /// that case.
    pub async fn replace(
        &self,
        org_id: Uuid,
        items: Vec<budget_items::ActiveModel>,
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        budget_items::Entity::delete_many()
            .filter(budget_items::Column::OrgId.eq(org_id))
            .exec(&txn)
            .await?;

        if !items.is_empty() {
            budget_items::Entity::insert_many(items).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Deletes an org's budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, org_id: Uuid) -> Result<(), DbErr> {
        budget_items::Entity::delete_many()
            .filter(budget_items::Column::OrgId.eq(org_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
