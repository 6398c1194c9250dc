//! Org and membership repository.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    sea_query::{Expr, JoinType},
};
use uuid::Uuid;

use crate::entities::{accounts, orgs, permissions, user_orgs};

/// Org repository.
#[derive(Debug, Clone)]
pub struct OrgRepository {
    db: DatabaseConnection,
}

impl OrgRepository {
    /// Creates a new org repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an org together with its admin membership, its seed accounts
    /// and the admin's write grant on `root_id`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub async fn create_with_accounts(
        &self,
        org: orgs::ActiveModel,
        admin_id: Uuid,
        seed_accounts: Vec<accounts::ActiveModel>,
        root_id: Uuid,
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        let org = org.insert(&txn).await?;
        let now = Utc::now();

        user_orgs::ActiveModel {
            user_id: Set(admin_id),
            org_id: Set(org.id),
            admin: Set(true),
            inserted: Set(now),
        }
        .insert(&txn)
        .await?;

        if !seed_accounts.is_empty() {
            accounts::Entity::insert_many(seed_accounts)
                .exec(&txn)
                .await?;
        }

        permissions::ActiveModel {
            user_id: Set(admin_id),
            org_id: Set(org.id),
            account_id: Set(root_id),
            inserted: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Updates the mutable columns of an org.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        timezone: &str,
        updated: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        orgs::Entity::update_many()
            .col_expr(orgs::Column::Name, Expr::value(name))
            .col_expr(orgs::Column::Timezone, Expr::value(timezone))
            .col_expr(orgs::Column::Updated, Expr::value(updated))
            .filter(orgs::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Finds an org by ID, only if `user_id` is a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_for_member(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<orgs::Model>, DbErr> {
        orgs::Entity::find_by_id(id)
            .join(JoinType::InnerJoin, orgs::Relation::UserOrgs.def())
            .filter(user_orgs::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    /// Lists the orgs a user belongs to, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_member(&self, user_id: Uuid) -> Result<Vec<orgs::Model>, DbErr> {
        orgs::Entity::find()
            .join(JoinType::InnerJoin, orgs::Relation::UserOrgs.def())
            .filter(user_orgs::Column::UserId.eq(user_id))
            .order_by_asc(orgs::Column::Name)
            .order_by_asc(orgs::Column::Id)
            .all(&self.db)
            .await
    }

    /// Member user ids of an org; only admins when `admins_only` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn member_ids(&self, org_id: Uuid, admins_only: bool) -> Result<Vec<Uuid>, DbErr> {
        let mut query = user_orgs::Entity::find().filter(user_orgs::Column::OrgId.eq(org_id));

        if admins_only {
            query = query.filter(user_orgs::Column::Admin.eq(true));
        }

        query
            .order_by_asc(user_orgs::Column::Inserted)
            .select_only()
            .column(user_orgs::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await
    }
}
