//! `SeaORM` entity definitions.
//!
//! Models mirror the table columns one to one; the derive macros also emit
//! undocumented `Column`, `ActiveModel` and `PrimaryKey` items.

#![allow(missing_docs)]

pub mod accounts;
pub mod budget_items;
pub mod invites;
pub mod orgs;
pub mod permissions;
pub mod prices;
pub mod splits;
pub mod transactions;
pub mod user_orgs;
