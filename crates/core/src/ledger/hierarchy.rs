//! Account hierarchy and permission resolution.
//!
//! An org's accounts form a tree under a single root. A user is granted write
//! access to specific accounts; the grant extends to every descendant, and
//! the user can additionally read (but not modify) every ancestor of a grant
//! and the org's top-level accounts.

use std::collections::HashMap;

use tally_shared::types::AccountId;

use super::types::Account;

/// Effective access to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Access {
    Read,
    Write,
}

#[derive(Debug)]
struct Node {
    account: Account,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena-backed tree of one org's accounts.
///
/// Nodes are stored in a `Vec` and linked by index, with a side index from
/// account id to arena slot. Orphans (parent id not present) and accounts
/// naming themselves as parent are treated as parentless.
#[derive(Debug)]
pub struct AccountTree {
    nodes: Vec<Node>,
    index: HashMap<AccountId, usize>,
}

impl AccountTree {
    /// Builds the tree in two passes: index by id, then link.
    ///
    /// When the same id appears twice the first occurrence wins.
    pub fn build(accounts: Vec<Account>) -> Self {
        let mut nodes = Vec::with_capacity(accounts.len());
        let mut index = HashMap::with_capacity(accounts.len());

        for account in accounts {
            if index.contains_key(&account.id) {
                continue;
            }
            index.insert(account.id, nodes.len());
            nodes.push(Node {
                account,
                parent: None,
                children: Vec::new(),
            });
        }

        for slot in 0..nodes.len() {
            let Some(parent_id) = nodes[slot].account.parent else {
                continue;
            };
            if parent_id == nodes[slot].account.id {
                continue;
            }
            if let Some(&parent_slot) = index.get(&parent_id) {
                nodes[slot].parent = Some(parent_slot);
                nodes[parent_slot].children.push(slot);
            }
        }

        for node in &mut nodes {
            node.account.has_children = !node.children.is_empty();
        }

        Self { nodes, index }
    }

    /// Number of accounts in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up an account by id.
    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.index.get(&id).map(|&slot| &self.nodes[slot].account)
    }

    /// The org's root: the first account stored without a parent.
    pub fn root(&self) -> Option<&Account> {
        self.nodes
            .iter()
            .find(|node| node.account.parent.is_none())
            .map(|node| &node.account)
    }

    /// Ids of every descendant of `id`, excluding `id` itself.
    pub fn descendants(&self, id: AccountId) -> Vec<AccountId> {
        self.index
            .get(&id)
            .map(|&slot| {
                self.descendant_slots(slot)
                    .into_iter()
                    .map(|s| self.nodes[s].account.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of every ancestor of `id`, nearest first.
    pub fn ancestors(&self, id: AccountId) -> Vec<AccountId> {
        self.index
            .get(&id)
            .map(|&slot| {
                self.ancestor_slots(slot)
                    .into_iter()
                    .map(|s| self.nodes[s].account.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when `candidate` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, candidate: AccountId, ancestor: AccountId) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    fn descendant_slots(&self, slot: usize) -> Vec<usize> {
        let mut seen = vec![false; self.nodes.len()];
        seen[slot] = true;
        let mut out = Vec::new();
        let mut stack = self.nodes[slot].children.clone();
        while let Some(next) = stack.pop() {
            if seen[next] {
                continue;
            }
            seen[next] = true;
            out.push(next);
            stack.extend_from_slice(&self.nodes[next].children);
        }
        out
    }

    // Bounded by the node count so a corrupt cycle cannot loop forever.
    fn ancestor_slots(&self, slot: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut current = self.nodes[slot].parent;
        while let Some(parent) = current {
            if parent == slot || out.len() >= self.nodes.len() || out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = self.nodes[parent].parent;
        }
        out
    }

    fn top_level_slots(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for (slot, node) in self.nodes.iter().enumerate() {
            if node.parent.is_none() {
                out.push(slot);
                out.extend_from_slice(&node.children);
            }
        }
        out
    }

    /// Computes the accounts visible to a user holding write grants on
    /// `permissioned`, annotated with `read_only`.
    ///
    /// Grants extend to all descendants; ancestors of a grant and the
    /// top-level accounts (every parentless account, orphans included, and
    /// their children) are visible read-only.
    /// Write wins over read. The result is sorted by name, then id.
    pub fn resolve(self, permissioned: &[AccountId]) -> Vec<Account> {
        let mut access: Vec<Option<Access>> = vec![None; self.nodes.len()];
        let mut grant = |slot: usize, level: Access| {
            access[slot] = Some(access[slot].map_or(level, |current| current.max(level)));
        };

        for id in permissioned {
            let Some(&slot) = self.index.get(id) else {
                continue;
            };
            grant(slot, Access::Write);
            for child in self.descendant_slots(slot) {
                grant(child, Access::Write);
            }
            for parent in self.ancestor_slots(slot) {
                grant(parent, Access::Read);
            }
        }
        for slot in self.top_level_slots() {
            grant(slot, Access::Read);
        }

        let mut visible: Vec<Account> = self
            .nodes
            .into_iter()
            .zip(access)
            .filter_map(|(node, level)| {
                level.map(|level| {
                    let mut account = node.account;
                    account.read_only = level == Access::Read;
                    account
                })
            })
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        visible
    }
}

/// Resolves the accounts a user may see, see [`AccountTree::resolve`].
pub fn resolve(accounts: Vec<Account>, permissioned: &[AccountId]) -> Vec<Account> {
    AccountTree::build(accounts).resolve(permissioned)
}

/// True when `accounts` holds `id` with write access.
pub fn has_write_access(accounts: &[Account], id: AccountId) -> bool {
    accounts.iter().any(|account| account.id == id && !account.read_only)
}
