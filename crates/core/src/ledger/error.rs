//! Ledger error types.
//!
//! Every failure a ledger operation can report, grouped into a small set of
//! [`ErrorKind`]s that transport layers map onto status codes.

use tally_shared::AppError;
use tally_shared::types::{AccountId, PriceId, TransactionId};
use thiserror::Error;

use crate::notify::NotifyError;
use crate::store::StoreError;

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request is malformed or violates a ledger rule.
    InvalidInput,
    /// The caller lacks membership, admin rights or account access.
    PermissionDenied,
    /// The referenced entity does not exist or is not visible.
    NotFound,
    /// The entity is in a state that forbids the operation.
    Conflict,
    /// The entity is past its validity window.
    Expired,
    /// The datastore failed.
    Persistence,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// A required field is empty.
    #[error("{0} required")]
    MissingField(&'static str),

    /// Transaction has fewer than two splits.
    #[error("at least 2 splits are required")]
    InsufficientSplits,

    /// A split targets an account that has children.
    #[error("Cannot use parent account for split")]
    ParentAccountSplit,

    /// A split on a native-currency account has amount != nativeAmount.
    #[error("nativeAmount must equal amount for native currency splits")]
    NativeAmountMismatch,

    /// Native amounts do not sum to zero.
    #[error("splits must add up to 0")]
    UnbalancedSplits,

    /// An account names itself as parent.
    #[error("account cannot be its own parent")]
    SelfParent,

    /// An account is moved under one of its own descendants.
    #[error("account cannot be moved under its own descendant")]
    DescendantParent,

    /// A replacement reuses the id of the transaction it replaces.
    #[error("replacement transaction must have a new id")]
    ReusedTransactionId,

    /// A query parameter could not be parsed.
    #[error("invalid {field}: {value}")]
    InvalidQueryParam {
        /// Parameter name.
        field: &'static str,
        /// Raw value supplied.
        value: String,
    },

    /// Org timezone is not an IANA zone name.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Price is not a positive finite number.
    #[error("price must be a positive number")]
    InvalidPrice,

    /// A converted amount does not fit in 64 bits.
    #[error("amount out of range")]
    AmountOverflow,

    /// Invite acceptance did not set `accepted`.
    #[error("accepted must be true")]
    InviteNotAccepted,

    /// Invite acceptance without an id.
    #[error("missing invite id")]
    MissingInviteId,

    // ========== Permission Errors ==========
    /// The caller has no write access to the account.
    #[error("user does not have permission to access account {0}")]
    AccountAccessDenied(AccountId),

    /// The caller is not a member of the org.
    #[error("User does not belong to org")]
    NotOrgMember,

    /// The caller cannot modify the org.
    #[error("access denied")]
    AccessDenied,

    /// Only admins can issue or list invites.
    #[error("Must be org admin to invite users")]
    AdminRequiredToInvite,

    /// Only admins can revoke invites.
    #[error("Must be org admin to delete invite")]
    AdminRequiredToDeleteInvite,

    // ========== Not Found Errors ==========
    /// Org not found or not visible to the caller.
    #[error("Org not found")]
    OrgNotFound,

    /// Account not found or not visible to the caller.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Transaction not found, deleted, or in another org.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Price not found.
    #[error("Price not found: {0}")]
    PriceNotFound(PriceId),

    /// The org has no budget items.
    #[error("Budget not found")]
    BudgetNotFound,

    /// Invite not found.
    #[error("Invite not found: {0}")]
    InviteNotFound(String),

    // ========== State Errors ==========
    /// Account still has non-deleted splits.
    #[error("Cannot delete an account that has transactions")]
    AccountHasTransactions,

    /// Account still has children.
    #[error("Cannot delete an account that has children")]
    AccountHasChildren,

    /// Invite was accepted before.
    #[error("invite already accepted")]
    InviteAlreadyAccepted,

    /// Invite is older than its validity window.
    #[error("invite has expired")]
    InviteExpired,

    // ========== Persistence Errors ==========
    /// Datastore failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Notification dispatch failure. Services log and swallow these; the
    /// variant exists for callers that push notifications themselves.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl LedgerError {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_)
            | Self::InsufficientSplits
            | Self::ParentAccountSplit
            | Self::NativeAmountMismatch
            | Self::UnbalancedSplits
            | Self::SelfParent
            | Self::DescendantParent
            | Self::ReusedTransactionId
            | Self::InvalidQueryParam { .. }
            | Self::InvalidTimezone(_)
            | Self::InvalidPrice
            | Self::AmountOverflow
            | Self::InviteNotAccepted
            | Self::MissingInviteId => ErrorKind::InvalidInput,

            Self::AccountAccessDenied(_)
            | Self::NotOrgMember
            | Self::AccessDenied
            | Self::AdminRequiredToInvite
            | Self::AdminRequiredToDeleteInvite => ErrorKind::PermissionDenied,

            Self::OrgNotFound
            | Self::AccountNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::PriceNotFound(_)
            | Self::BudgetNotFound
            | Self::InviteNotFound(_) => ErrorKind::NotFound,

            Self::AccountHasTransactions
            | Self::AccountHasChildren
            | Self::InviteAlreadyAccepted
            | Self::Store(StoreError::Duplicate(_)) => ErrorKind::Conflict,

            Self::InviteExpired => ErrorKind::Expired,

            Self::Store(_) | Self::Notify(_) => ErrorKind::Persistence,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InsufficientSplits => "INSUFFICIENT_SPLITS",
            Self::ParentAccountSplit => "PARENT_ACCOUNT_SPLIT",
            Self::NativeAmountMismatch => "NATIVE_AMOUNT_MISMATCH",
            Self::UnbalancedSplits => "UNBALANCED_SPLITS",
            Self::SelfParent => "SELF_PARENT",
            Self::DescendantParent => "DESCENDANT_PARENT",
            Self::ReusedTransactionId => "REUSED_TRANSACTION_ID",
            Self::InvalidQueryParam { .. } => "INVALID_QUERY_PARAM",
            Self::InvalidTimezone(_) => "INVALID_TIMEZONE",
            Self::InvalidPrice => "INVALID_PRICE",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::InviteNotAccepted => "INVITE_NOT_ACCEPTED",
            Self::MissingInviteId => "MISSING_INVITE_ID",
            Self::AccountAccessDenied(_) => "ACCOUNT_ACCESS_DENIED",
            Self::NotOrgMember => "NOT_ORG_MEMBER",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::AdminRequiredToInvite
            | Self::AdminRequiredToDeleteInvite => "ADMIN_REQUIRED",
            Self::OrgNotFound => "ORG_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::PriceNotFound(_) => "PRICE_NOT_FOUND",
            Self::BudgetNotFound => "BUDGET_NOT_FOUND",
            Self::InviteNotFound(_) => "INVITE_NOT_FOUND",
            Self::AccountHasTransactions => "ACCOUNT_HAS_TRANSACTIONS",
            Self::AccountHasChildren => "ACCOUNT_HAS_CHILDREN",
            Self::InviteAlreadyAccepted => "INVITE_ALREADY_ACCEPTED",
            Self::InviteExpired => "INVITE_EXPIRED",
            Self::Store(StoreError::Duplicate(_)) => "DUPLICATE_RECORD",
            Self::Store(_) => "DATABASE_ERROR",
            Self::Notify(_) => "NOTIFICATION_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput => 400,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Expired => 410,
            ErrorKind::Persistence => 500,
        }
    }

    /// Returns whether the caller may retry the same request.
    ///
    /// Datastore failures are surfaced as-is and never retried by the core.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::InvalidInput => Self::Validation(message),
            ErrorKind::PermissionDenied => Self::Forbidden(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Expired => Self::Expired(message),
            ErrorKind::Persistence => match err {
                LedgerError::Store(StoreError::Database(_)) => Self::Database(message),
                _ => Self::Internal(message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LedgerError::UnbalancedSplits, 400, ErrorKind::InvalidInput)]
    #[case(LedgerError::InsufficientSplits, 400, ErrorKind::InvalidInput)]
    #[case(LedgerError::AccountAccessDenied(AccountId::new()), 403, ErrorKind::PermissionDenied)]
    #[case(LedgerError::BudgetNotFound, 404, ErrorKind::NotFound)]
    #[case(LedgerError::AccountHasChildren, 409, ErrorKind::Conflict)]
    #[case(LedgerError::InviteExpired, 410, ErrorKind::Expired)]
    #[case(LedgerError::Store(StoreError::Database("down".into())), 500, ErrorKind::Persistence)]
    #[case(LedgerError::Store(StoreError::Duplicate("tx".into())), 409, ErrorKind::Conflict)]
    fn test_kind_and_status(
        #[case] err: LedgerError,
        #[case] status: u16,
        #[case] kind: ErrorKind,
    ) {
        assert_eq!(err.http_status_code(), status);
        assert_eq!(err.kind(), kind);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_messages() {
        assert_eq!(LedgerError::MissingField("name").to_string(), "name required");
        assert_eq!(
            LedgerError::AccountHasTransactions.to_string(),
            "Cannot delete an account that has transactions"
        );
        let id = AccountId::new();
        assert_eq!(
            LedgerError::AccountAccessDenied(id).to_string(),
            format!("user does not have permission to access account {id}")
        );
    }

    #[test]
    fn test_into_app_error_preserves_message() {
        let app: AppError = LedgerError::UnbalancedSplits.into();
        assert_eq!(app.status_code(), 400);
        assert_eq!(app.message(), "splits must add up to 0");

        let app: AppError = LedgerError::Store(StoreError::Database("boom".into())).into();
        assert_eq!(app.error_code(), "DATABASE_ERROR");

        let app: AppError = LedgerError::InviteExpired.into();
        assert_eq!(app.status_code(), 410);
    }
}
