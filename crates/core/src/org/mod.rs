//! Organizations, membership and invites.

pub mod service;
pub mod types;

pub use types::{INVITE_TTL_DAYS, Invite, Org, new_invite_id};
