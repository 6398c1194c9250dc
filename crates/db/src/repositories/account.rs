//! Account repository for chart-of-accounts rows, grants and balance sums.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Alias, Expr, Func, SimpleExpr},
};
use uuid::Uuid;

use crate::entities::{accounts, permissions, splits};

/// Which split column a balance sum aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitColumn {
    /// Amount in the account's own currency.
    Amount,
    /// Amount in the org's currency at posting time.
    NativeAmount,
}

impl SplitColumn {
    const fn column(self) -> splits::Column {
        match self {
            Self::Amount => splits::Column::Amount,
            Self::NativeAmount => splits::Column::NativeAmount,
        }
    }
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, account: accounts::ActiveModel) -> Result<(), DbErr> {
        account.insert(&self.db).await?;
        Ok(())
    }

    /// Overwrites the editable columns of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(&self, account: &accounts::Model) -> Result<(), DbErr> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::Name, Expr::value(account.name.clone()))
            .col_expr(accounts::Column::ParentId, Expr::value(account.parent_id))
            .col_expr(accounts::Column::Currency, Expr::value(account.currency.clone()))
            .col_expr(accounts::Column::Precision, Expr::value(account.precision))
            .col_expr(accounts::Column::DebitBalance, Expr::value(account.debit_balance))
            .col_expr(accounts::Column::Updated, Expr::value(account.updated))
            .filter(accounts::Column::Id.eq(account.id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Finds an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<accounts::Model>, DbErr> {
        accounts::Entity::find_by_id(id).one(&self.db).await
    }

    /// Lists an org's accounts in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_org(&self, org_id: Uuid) -> Result<Vec<accounts::Model>, DbErr> {
        accounts::Entity::find()
            .filter(accounts::Column::OrgId.eq(org_id))
            .order_by_asc(accounts::Column::Inserted)
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await
    }

    /// Account ids a user holds an explicit write grant on.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn permissioned_ids(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<Uuid>, DbErr> {
        permissions::Entity::find()
            .filter(permissions::Column::OrgId.eq(org_id))
            .filter(permissions::Column::UserId.eq(user_id))
            .select_only()
            .column(permissions::Column::AccountId)
            .into_tuple()
            .all(&self.db)
            .await
    }

    /// Counts live splits posted to an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn split_count(&self, id: Uuid) -> Result<u64, DbErr> {
        splits::Entity::find()
            .filter(splits::Column::AccountId.eq(id))
            .filter(splits::Column::Deleted.eq(false))
            .count(&self.db)
            .await
    }

    /// Counts direct children of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn child_count(&self, id: Uuid) -> Result<u64, DbErr> {
        accounts::Entity::find()
            .filter(accounts::Column::ParentId.eq(id))
            .count(&self.db)
            .await
    }

    /// Deletes an account row. Its grants go with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbErr> {
        accounts::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    /// Sums live splits dated strictly before `before`, per account.
    ///
    /// Accounts with no matching splits produce no row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a total leaves the
    /// `BIGINT` range.
    pub async fn sum_splits(
        &self,
        account_ids: &[Uuid],
        before: DateTime<Utc>,
        column: SplitColumn,
    ) -> Result<Vec<(Uuid, i64)>, DbErr> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let total = SimpleExpr::from(Func::cast_as(
            Func::sum(Expr::col(column.column())),
            Alias::new("BIGINT"),
        ));

        splits::Entity::find()
            .select_only()
            .column(splits::Column::AccountId)
            .column_as(total, "total")
            .filter(splits::Column::AccountId.is_in(account_ids.iter().copied()))
            .filter(splits::Column::Deleted.eq(false))
            .filter(splits::Column::Date.lt(before))
            .group_by(splits::Column::AccountId)
            .into_tuple()
            .all(&self.db)
            .await
    }
}
