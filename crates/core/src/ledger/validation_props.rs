//! Property-based tests for split validation.

use proptest::prelude::*;
use tally_shared::types::{AccountId, OrganizationId};

use super::error::LedgerError;
use super::hierarchy::resolve;
use super::types::{Account, Split};
use super::validation::{check_zero_sum, validate_splits};

/// A root with `n` writable USD leaves beneath it.
fn leaves(n: usize) -> (Vec<Account>, Vec<AccountId>) {
    let org = OrganizationId::new();
    let root = Account::new(org, "Root", None, "USD", 2, true);
    let root_id = root.id;
    let mut accounts = vec![root];
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let leaf = Account::new(org, format!("Leaf {i}"), Some(root_id), "USD", 2, true);
        ids.push(leaf.id);
        accounts.push(leaf);
    }
    (resolve(accounts, &[root_id]), ids)
}

/// Amounts whose negated sum still fits comfortably in i64.
fn amounts() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-1_000_000_000_000i64..1_000_000_000_000i64, 1..10)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Closing a set of amounts with their negated sum always balances.
    #[test]
    fn prop_balanced_splits_accepted(values in amounts()) {
        let (accessible, ids) = leaves(values.len() + 1);
        let total: i64 = values.iter().sum();
        let mut splits: Vec<Split> = values
            .iter()
            .zip(&ids)
            .map(|(&v, &id)| Split::new(id, v, v))
            .collect();
        splits.push(Split::new(ids[values.len()], -total, -total));

        prop_assert!(validate_splits(&splits, "USD", &accessible).is_ok());
    }

    /// Any non-zero imbalance is rejected with the zero-sum error.
    #[test]
    fn prop_unbalanced_splits_rejected(
        values in amounts(),
        drift in prop_oneof![-1_000_000i64..-1, 1i64..1_000_000],
    ) {
        let (accessible, ids) = leaves(values.len() + 1);
        let total: i64 = values.iter().sum();
        let mut splits: Vec<Split> = values
            .iter()
            .zip(&ids)
            .map(|(&v, &id)| Split::new(id, v, v))
            .collect();
        let closing = -total + drift;
        splits.push(Split::new(ids[values.len()], closing, closing));

        let result = validate_splits(&splits, "USD", &accessible);
        prop_assert!(matches!(result, Err(LedgerError::UnbalancedSplits)));
    }

    /// Zero-sum checking is independent of split order.
    #[test]
    fn prop_zero_sum_order_independent(mut values in amounts()) {
        let account = AccountId::new();
        let total: i64 = values.iter().sum();
        values.push(-total);
        let forward: Vec<Split> = values.iter().map(|&v| Split::new(account, v, v)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        prop_assert!(check_zero_sum(&forward).is_ok());
        prop_assert!(check_zero_sum(&backward).is_ok());
    }
}
