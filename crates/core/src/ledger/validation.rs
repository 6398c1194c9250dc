//! Double-entry rules for transaction splits.

use super::error::LedgerError;
use super::hierarchy::has_write_access;
use super::types::{Account, Split};

/// Minimum number of splits in a transaction.
pub const MIN_SPLITS: usize = 2;

/// Rejects transactions with fewer than [`MIN_SPLITS`] splits.
pub fn check_split_count(splits: &[Split]) -> Result<(), LedgerError> {
    if splits.len() < MIN_SPLITS {
        return Err(LedgerError::InsufficientSplits);
    }
    Ok(())
}

/// Validates splits against the caller's accessible accounts.
///
/// Rules, checked in order:
/// 1. at least two splits
/// 2. per split: write access to the account, and the account is a leaf
/// 3. per split on an account in `org_currency`: `amount == native_amount`
/// 4. native amounts sum to zero
///
/// `accessible` is the resolver output for the caller.
pub fn validate_splits(
    splits: &[Split],
    org_currency: &str,
    accessible: &[Account],
) -> Result<(), LedgerError> {
    check_split_count(splits)?;

    for split in splits {
        let account = accessible
            .iter()
            .find(|account| account.id == split.account_id)
            .filter(|_| has_write_access(accessible, split.account_id))
            .ok_or(LedgerError::AccountAccessDenied(split.account_id))?;

        if account.has_children {
            return Err(LedgerError::ParentAccountSplit);
        }

        if account.currency == org_currency && split.amount != split.native_amount {
            return Err(LedgerError::NativeAmountMismatch);
        }
    }

    check_zero_sum(splits)
}

/// Verifies that native amounts add up to zero.
///
/// Accumulates in 128 bits so no combination of i64 amounts can overflow.
pub fn check_zero_sum(splits: &[Split]) -> Result<(), LedgerError> {
    let total: i128 = splits.iter().map(|s| i128::from(s.native_amount)).sum();
    if total != 0 {
        return Err(LedgerError::UnbalancedSplits);
    }
    Ok(())
}
