//! `SeaORM` Entity for orgs table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orgs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub inserted: DateTimeUtc,
    pub updated: DateTimeUtc,
    pub name: String,
    pub currency: String,
    pub precision: i32,
    pub timezone: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounts::Entity")]
    Accounts,
    #[sea_orm(has_many = "super::user_orgs::Entity")]
    UserOrgs,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::user_orgs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserOrgs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
