//! Invite repository.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::entities::{accounts, invites, permissions, user_orgs};

/// Invite repository.
#[derive(Debug, Clone)]
pub struct InviteRepository {
    db: DatabaseConnection,
}

impl InviteRepository {
    /// Creates a new invite repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an invite.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, invite: invites::ActiveModel) -> Result<(), DbErr> {
        invite.insert(&self.db).await?;
        Ok(())
    }

    /// Finds an invite by its short id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<invites::Model>, DbErr> {
        invites::Entity::find_by_id(id.to_owned()).one(&self.db).await
    }

    /// Lists an org's invites, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_org(&self, org_id: Uuid) -> Result<Vec<invites::Model>, DbErr> {
        invites::Entity::find()
            .filter(invites::Column::OrgId.eq(org_id))
            .order_by_asc(invites::Column::Inserted)
            .all(&self.db)
            .await
    }

    /// Marks an invite accepted and joins `user_id` to the org with write
    /// access on its root account.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails, or
    /// [`DbErr::RecordNotFound`] when the org has no root account.
    pub async fn accept(
        &self,
        id: &str,
        org_id: Uuid,
        user_id: Uuid,
        updated: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        let root = accounts::Entity::find()
            .filter(accounts::Column::OrgId.eq(org_id))
            .filter(accounts::Column::ParentId.is_null())
            .order_by_asc(accounts::Column::Inserted)
            .order_by_asc(accounts::Column::Id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("root account of org {org_id}")))?;

        invites::Entity::update_many()
            .col_expr(invites::Column::Accepted, Expr::value(true))
            .col_expr(invites::Column::Updated, Expr::value(updated))
            .filter(invites::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        let membership = user_orgs::Entity::find_by_id((user_id, org_id))
            .one(&txn)
            .await?;
        if membership.is_none() {
            user_orgs::ActiveModel {
                user_id: Set(user_id),
                org_id: Set(org_id),
                admin: Set(false),
                inserted: Set(updated),
            }
            .insert(&txn)
            .await?;
        }

        let grant = permissions::Entity::find_by_id((user_id, org_id, root.id))
            .one(&txn)
            .await?;
        if grant.is_none() {
            permissions::ActiveModel {
                user_id: Set(user_id),
                org_id: Set(org_id),
                account_id: Set(root.id),
                inserted: Set(updated),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Deletes an invite.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: &str) -> Result<(), DbErr> {
        invites::Entity::delete_by_id(id.to_owned())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
