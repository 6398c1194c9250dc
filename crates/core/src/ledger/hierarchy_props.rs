//! Property-based tests for permission resolution.

use proptest::prelude::*;
use tally_shared::types::{AccountId, OrganizationId};

use super::hierarchy::{AccountTree, resolve};
use super::types::Account;

/// Random tree: node `i > 0` hangs under a node with a smaller index.
fn tree_shape() -> impl Strategy<Value = Vec<usize>> {
    (2usize..40).prop_flat_map(|n| (1..n).map(|i| 0..i).collect::<Vec<_>>())
}

fn build(parents: &[usize]) -> Vec<Account> {
    let org = OrganizationId::new();
    let mut accounts = vec![Account::new(org, "Root", None, "USD", 2, true)];
    for (i, &p) in parents.iter().enumerate() {
        let parent = accounts[p].id;
        accounts.push(Account::new(org, format!("N{i}"), Some(parent), "USD", 2, true));
    }
    accounts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Descendants of a grant are writable; its ancestors are visible.
    #[test]
    fn prop_grant_covers_subtree(parents in tree_shape(), pick in any::<prop::sample::Index>()) {
        let accounts = build(&parents);
        let granted = accounts[pick.index(accounts.len())].id;
        let tree = AccountTree::build(accounts.clone());
        let below = tree.descendants(granted);
        let above = tree.ancestors(granted);

        let visible = resolve(accounts, &[granted]);
        let find = |id: AccountId| visible.iter().find(|a| a.id == id);

        prop_assert!(!find(granted).unwrap().read_only);
        for id in below {
            prop_assert!(!find(id).unwrap().read_only);
        }
        for id in above {
            prop_assert!(find(id).is_some());
        }
    }

    /// Without a grant on Root or one of its children, those stay read-only.
    #[test]
    fn prop_top_level_always_visible(parents in tree_shape(), grants in prop::collection::vec(any::<prop::sample::Index>(), 0..4)) {
        let accounts = build(&parents);
        let root = accounts[0].id;
        let ids: Vec<AccountId> = grants.iter().map(|g| accounts[g.index(accounts.len())].id).collect();
        let visible = resolve(accounts.clone(), &ids);

        for top in accounts.iter().filter(|a| a.parent.is_none() || a.parent == Some(root)) {
            prop_assert!(visible.iter().any(|a| a.id == top.id));
        }
        prop_assert!(visible.windows(2).all(|w| (&w[0].name, w[0].id) <= (&w[1].name, w[1].id)));
    }

    /// A root grant makes every account writable.
    #[test]
    fn prop_root_grant_is_total(parents in tree_shape()) {
        let accounts = build(&parents);
        let root = accounts[0].id;
        let total = accounts.len();
        let visible = resolve(accounts, &[root]);
        prop_assert_eq!(visible.len(), total);
        prop_assert!(visible.iter().all(|a| !a.read_only));
    }
}
