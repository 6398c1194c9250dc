//! Price repository.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
    sea_query::{Expr, Order, SimpleExpr},
};
use uuid::Uuid;

use crate::entities::prices;

/// Price repository.
#[derive(Debug, Clone)]
pub struct PriceRepository {
    db: DatabaseConnection,
}

impl PriceRepository {
    /// Creates a new price repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a price.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, price: prices::ActiveModel) -> Result<(), DbErr> {
        price.insert(&self.db).await?;
        Ok(())
    }

    /// Finds a price by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<prices::Model>, DbErr> {
        prices::Entity::find_by_id(id).one(&self.db).await
    }

    /// Deletes a price.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbErr> {
        prices::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    /// The price of `currency` dated closest to `as_of`; the earlier one
    /// wins a tie.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_nearest(
        &self,
        org_id: Uuid,
        currency: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Option<prices::Model>, DbErr> {
        prices::Entity::find()
            .filter(prices::Column::OrgId.eq(org_id))
            .filter(prices::Column::Currency.eq(currency))
            .order_by(distance_from(as_of), Order::Asc)
            .order_by_asc(prices::Column::Date)
            .one(&self.db)
            .await
    }

    /// One price per currency, each the closest to `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_nearest_per_currency(
        &self,
        org_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Vec<prices::Model>, DbErr> {
        prices::Entity::find()
            .distinct_on([prices::Column::Currency])
            .filter(prices::Column::OrgId.eq(org_id))
            .order_by_asc(prices::Column::Currency)
            .order_by(distance_from(date), Order::Asc)
            .order_by_asc(prices::Column::Date)
            .all(&self.db)
            .await
    }

    /// Every price of `currency`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_currency(
        &self,
        org_id: Uuid,
        currency: &str,
    ) -> Result<Vec<prices::Model>, DbErr> {
        prices::Entity::find()
            .filter(prices::Column::OrgId.eq(org_id))
            .filter(prices::Column::Currency.eq(currency))
            .order_by_asc(prices::Column::Date)
            .order_by_asc(prices::Column::Id)
            .all(&self.db)
            .await
    }
}

/// Absolute distance in seconds between a price's date and `target`.
fn distance_from(target: DateTime<Utc>) -> SimpleExpr {
    Expr::cust_with_values(
        r#"ABS(EXTRACT(EPOCH FROM ("prices"."date" - ?)))"#,
        [target],
    )
}
