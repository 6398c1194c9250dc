//! Transaction repository.
//!
//! A transaction and its splits always change together inside one database
//! transaction. Deletion is soft: both rows keep existing with `deleted` set.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
    sea_query::{Expr, Query},
};
use tally_core::ledger::{QueryOptions, SortOrder};
use uuid::Uuid;

use crate::entities::{splits, transactions};

/// A transaction row with its split rows in insertion order.
pub type TransactionWithSplits = (transactions::Model, Vec<splits::Model>);

/// Transaction repository.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a transaction and its splits.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub async fn insert(
        &self,
        transaction: transactions::ActiveModel,
        split_rows: Vec<splits::ActiveModel>,
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;
        insert_rows(&txn, transaction, split_rows).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Finds a transaction with its splits, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionWithSplits>, DbErr> {
        let Some(transaction) = transactions::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let split_rows = splits::Entity::find()
            .filter(splits::Column::TransactionId.eq(id))
            .order_by_asc(splits::Column::Id)
            .all(&self.db)
            .await?;

        Ok(Some((transaction, split_rows)))
    }

    /// Lists transactions touching any of `account_ids`, optionally limited
    /// to one org, filtered, sorted and paginated by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_accounts(
        &self,
        org_id: Option<Uuid>,
        account_ids: &[Uuid],
        options: &QueryOptions,
    ) -> Result<Vec<TransactionWithSplits>, DbErr> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let touching = Query::select()
            .column(splits::Column::TransactionId)
            .from(splits::Entity)
            .and_where(Expr::col(splits::Column::AccountId).is_in(account_ids.iter().copied()))
            .to_owned();

        let mut query =
            transactions::Entity::find().filter(transactions::Column::Id.in_subquery(touching));

        if let Some(org_id) = org_id {
            query = query.filter(transactions::Column::OrgId.eq(org_id));
        }

        let rows = apply_options(query, options).all(&self.db).await?;
        self.attach_splits(rows).await
    }

    /// Soft-deletes a transaction and its splits.
    ///
    /// # Errors
    ///
    /// Returns an error if either update fails.
    pub async fn soft_delete(&self, id: Uuid, updated: DateTime<Utc>) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;
        mark_deleted(&txn, id, updated).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Soft-deletes `old_id` and inserts its replacement atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing changes in that case.
    pub async fn replace(
        &self,
        old_id: Uuid,
        transaction: transactions::ActiveModel,
        split_rows: Vec<splits::ActiveModel>,
        updated: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;
        mark_deleted(&txn, old_id, updated).await?;
        insert_rows(&txn, transaction, split_rows).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn attach_splits(
        &self,
        rows: Vec<transactions::Model>,
    ) -> Result<Vec<TransactionWithSplits>, DbErr> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_transaction: HashMap<Uuid, Vec<splits::Model>> = HashMap::new();
        for split in splits::Entity::find()
            .filter(splits::Column::TransactionId.is_in(rows.iter().map(|t| t.id)))
            .order_by_asc(splits::Column::Id)
            .all(&self.db)
            .await?
        {
            by_transaction
                .entry(split.transaction_id)
                .or_default()
                .push(split);
        }

        Ok(rows
            .into_iter()
            .map(|t| {
                let split_rows = by_transaction.remove(&t.id).unwrap_or_default();
                (t, split_rows)
            })
            .collect())
    }
}

async fn insert_rows<C: ConnectionTrait>(
    conn: &C,
    transaction: transactions::ActiveModel,
    split_rows: Vec<splits::ActiveModel>,
) -> Result<(), DbErr> {
    transaction.insert(conn).await?;
    if !split_rows.is_empty() {
        splits::Entity::insert_many(split_rows).exec(conn).await?;
    }
    Ok(())
}

async fn mark_deleted<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    updated: DateTime<Utc>,
) -> Result<(), DbErr> {
    transactions::Entity::update_many()
        .col_expr(transactions::Column::Deleted, Expr::value(true))
        .col_expr(transactions::Column::Updated, Expr::value(updated))
        .filter(transactions::Column::Id.eq(id))
        .exec(conn)
        .await?;

    splits::Entity::update_many()
        .col_expr(splits::Column::Deleted, Expr::value(true))
        .col_expr(splits::Column::Updated, Expr::value(updated))
        .filter(splits::Column::TransactionId.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

fn apply_options(
    mut query: Select<transactions::Entity>,
    options: &QueryOptions,
) -> Select<transactions::Entity> {
    if !options.include_deleted {
        query = query.filter(transactions::Column::Deleted.eq(false));
    }
    if let Some(t) = options.since_inserted {
        query = query.filter(transactions::Column::Inserted.gt(t));
    }
    if let Some(t) = options.since_updated {
        query = query.filter(transactions::Column::Updated.gt(t));
    }
    if let Some(t) = options.before_inserted {
        query = query.filter(transactions::Column::Inserted.lt(t));
    }
    if let Some(t) = options.before_updated {
        query = query.filter(transactions::Column::Updated.lt(t));
    }
    if let Some(t) = options.start_date {
        query = query.filter(transactions::Column::Date.gte(t));
    }
    if let Some(t) = options.end_date {
        query = query.filter(transactions::Column::Date.lt(t));
    }
    if let Some(prefix) = options.description_starts_with.as_deref() {
        query = query.filter(transactions::Column::Description.like(like_prefix(prefix)));
    }

    query = match options.sort {
        SortOrder::DateDesc => query
            .order_by_desc(transactions::Column::Date)
            .order_by_desc(transactions::Column::Inserted)
            .order_by_asc(transactions::Column::Id),
        SortOrder::UpdatedAsc => query
            .order_by_asc(transactions::Column::Updated)
            .order_by_asc(transactions::Column::Id),
    };

    if let Some(limit) = options.limit {
        query = query.offset(options.skip).limit(limit);
    }
    query
}

/// Builds a `LIKE` pattern matching values that start with `prefix` taken
/// literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("rent"), "rent%");
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
    }

    #[test]
    fn test_like_prefix_empty_matches_everything() {
        assert_eq!(like_prefix(""), "%");
    }
}
