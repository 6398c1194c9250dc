//! Listing options for transaction queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::error::LedgerError;
use super::types::Transaction;

/// Result ordering for transaction listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Value date descending, then inserted descending.
    #[default]
    DateDesc,
    /// Last modification ascending, for incremental sync.
    UpdatedAsc,
}

/// Filters, ordering and pagination for transaction listings.
///
/// Bounds on `inserted`/`updated` are exclusive; `start_date` is inclusive
/// and `end_date` exclusive. `skip` only takes effect together with `limit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum number of transactions.
    pub limit: Option<u64>,
    /// Transactions to skip before the first returned one.
    pub skip: u64,
    /// Only transactions inserted after this instant.
    pub since_inserted: Option<DateTime<Utc>>,
    /// Only transactions updated after this instant.
    pub since_updated: Option<DateTime<Utc>>,
    /// Only transactions inserted before this instant.
    pub before_inserted: Option<DateTime<Utc>>,
    /// Only transactions updated before this instant.
    pub before_updated: Option<DateTime<Utc>>,
    /// Only transactions dated on or after this instant.
    pub start_date: Option<DateTime<Utc>>,
    /// Only transactions dated before this instant.
    pub end_date: Option<DateTime<Utc>>,
    /// Only transactions whose description starts with this prefix.
    pub description_starts_with: Option<String>,
    /// Include soft-deleted transactions.
    pub include_deleted: bool,
    /// Result ordering.
    pub sort: SortOrder,
}

impl QueryOptions {
    /// Parses options from a flat string map such as a URL query.
    ///
    /// Numeric values are integers; timestamps are epoch milliseconds. Zero
    /// means unset. Only the literal `"true"` enables `includeDeleted`, and
    /// any `sort` other than `"updated-asc"` selects the default order.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, LedgerError> {
        let limit = parse_u64(params, "limit")?.filter(|&v| v > 0);
        let skip = parse_u64(params, "skip")?.unwrap_or(0);

        let description_starts_with = params
            .get("descriptionStartsWith")
            .filter(|value| !value.is_empty())
            .cloned();

        let sort = match params.get("sort").map(String::as_str) {
            Some("updated-asc") => SortOrder::UpdatedAsc,
            _ => SortOrder::DateDesc,
        };

        Ok(Self {
            limit,
            skip,
            since_inserted: parse_millis(params, "sinceInserted")?,
            since_updated: parse_millis(params, "sinceUpdated")?,
            before_inserted: parse_millis(params, "beforeInserted")?,
            before_updated: parse_millis(params, "beforeUpdated")?,
            start_date: parse_millis(params, "startDate")?,
            end_date: parse_millis(params, "endDate")?,
            description_starts_with,
            include_deleted: params.get("includeDeleted").is_some_and(|v| v == "true"),
            sort,
        })
    }

    /// True when `tx` passes every filter.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if tx.deleted && !self.include_deleted {
            return false;
        }
        if self.since_inserted.is_some_and(|t| tx.inserted <= t)
            || self.since_updated.is_some_and(|t| tx.updated <= t)
            || self.before_inserted.is_some_and(|t| tx.inserted >= t)
            || self.before_updated.is_some_and(|t| tx.updated >= t)
            || self.start_date.is_some_and(|t| tx.date < t)
            || self.end_date.is_some_and(|t| tx.date >= t)
        {
            return false;
        }
        self.description_starts_with
            .as_deref()
            .is_none_or(|prefix| tx.description.starts_with(prefix))
    }

    /// Orders transactions in place. Ties are broken by id for stable pages.
    pub fn sort(&self, transactions: &mut [Transaction]) {
        match self.sort {
            SortOrder::DateDesc => transactions.sort_by(|a, b| {
                b.date
                    .cmp(&a.date)
                    .then_with(|| b.inserted.cmp(&a.inserted))
                    .then_with(|| a.id.cmp(&b.id))
            }),
            SortOrder::UpdatedAsc => transactions
                .sort_by(|a, b| a.updated.cmp(&b.updated).then_with(|| a.id.cmp(&b.id))),
        }
    }

    /// Applies `skip`/`limit` to an already sorted list.
    pub fn paginate(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        match self.limit {
            Some(limit) => transactions
                .into_iter()
                .skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => transactions,
        }
    }

    /// Filters, sorts and paginates.
    pub fn apply(&self, transactions: impl IntoIterator<Item = Transaction>) -> Vec<Transaction> {
        let mut matching: Vec<Transaction> =
            transactions.into_iter().filter(|tx| self.matches(tx)).collect();
        self.sort(&mut matching);
        self.paginate(matching)
    }
}

fn parse_u64(
    params: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<u64>, LedgerError> {
    params
        .get(field)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<u64>().map_err(|_| LedgerError::InvalidQueryParam {
                field,
                value: value.clone(),
            })
        })
        .transpose()
}

fn parse_millis(
    params: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, LedgerError> {
    let Some(value) = params.get(field).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let invalid = || LedgerError::InvalidQueryParam {
        field,
        value: value.clone(),
    };
    let millis = value.parse::<i64>().map_err(|_| invalid())?;
    if millis == 0 {
        return Ok(None);
    }
    DateTime::from_timestamp_millis(millis).map(Some).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::Split;
    use chrono::TimeZone;
    use rstest::rstest;
    use tally_shared::types::{AccountId, OrganizationId};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn tx(description: &str, date: i64, inserted: i64, updated: i64) -> Transaction {
        let account = AccountId::new();
        let mut tx = Transaction::new(
            OrganizationId::new(),
            description,
            vec![Split::new(account, 1, 1), Split::new(account, -1, -1)],
        );
        tx.date = at(date);
        tx.inserted = at(inserted);
        tx.updated = at(updated);
        tx
    }

    #[test]
    fn test_defaults() {
        let opts = QueryOptions::from_params(&HashMap::new()).unwrap();
        assert_eq!(opts, QueryOptions::default());
    }

    #[test]
    fn test_parse_all() {
        let opts = QueryOptions::from_params(&params(&[
            ("limit", "10"),
            ("skip", "20"),
            ("sinceInserted", "1000"),
            ("beforeUpdated", "2000"),
            ("startDate", "3000"),
            ("endDate", "0"),
            ("descriptionStartsWith", "Gro"),
            ("includeDeleted", "true"),
            ("sort", "updated-asc"),
        ]))
        .unwrap();

        assert_eq!(opts.limit, Some(10));
        assert_eq!(opts.skip, 20);
        assert_eq!(opts.since_inserted, Some(at(1000)));
        assert_eq!(opts.before_updated, Some(at(2000)));
        assert_eq!(opts.start_date, Some(at(3000)));
        assert_eq!(opts.end_date, None);
        assert_eq!(opts.description_starts_with.as_deref(), Some("Gro"));
        assert!(opts.include_deleted);
        assert_eq!(opts.sort, SortOrder::UpdatedAsc);
    }

    #[rstest]
    #[case("includeDeleted", "TRUE")]
    #[case("includeDeleted", "1")]
    #[case("sort", "date-asc")]
    fn test_lenient_flags(#[case] key: &str, #[case] value: &str) {
        let opts = QueryOptions::from_params(&params(&[(key, value)])).unwrap();
        assert!(!opts.include_deleted);
        assert_eq!(opts.sort, SortOrder::DateDesc);
    }

    #[rstest]
    #[case("limit", "ten")]
    #[case("skip", "-1")]
    #[case("sinceUpdated", "1.5")]
    #[case("endDate", "yesterday")]
    fn test_non_integer_rejected(#[case] key: &str, #[case] value: &str) {
        let err = QueryOptions::from_params(&params(&[(key, value)])).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQueryParam { field, .. } if field == key));
    }

    #[test]
    fn test_bounds() {
        let opts = QueryOptions {
            since_inserted: Some(at(100)),
            before_inserted: Some(at(300)),
            ..QueryOptions::default()
        };
        assert!(!opts.matches(&tx("a", 0, 100, 100)));
        assert!(opts.matches(&tx("a", 0, 200, 200)));
        assert!(!opts.matches(&tx("a", 0, 300, 300)));

        let opts = QueryOptions {
            start_date: Some(at(100)),
            end_date: Some(at(200)),
            ..QueryOptions::default()
        };
        assert!(opts.matches(&tx("a", 100, 0, 0)));
        assert!(!opts.matches(&tx("a", 200, 0, 0)));
        assert!(!opts.matches(&tx("a", 99, 0, 0)));
    }

    #[test]
    fn test_deleted_hidden_by_default() {
        let mut deleted = tx("a", 1, 1, 1);
        deleted.deleted = true;
        assert!(!QueryOptions::default().matches(&deleted));
        let opts = QueryOptions {
            include_deleted: true,
            ..QueryOptions::default()
        };
        assert!(opts.matches(&deleted));
    }

    #[test]
    fn test_description_prefix() {
        let opts = QueryOptions {
            description_starts_with: Some("Gro".into()),
            ..QueryOptions::default()
        };
        assert!(opts.matches(&tx("Groceries", 1, 1, 1)));
        assert!(!opts.matches(&tx("Big groceries", 1, 1, 1)));
    }

    #[test]
    fn test_sort_orders() {
        let older = tx("older", 100, 5, 50);
        let newer_a = tx("newer a", 200, 1, 10);
        let newer_b = tx("newer b", 200, 2, 30);

        let sorted = QueryOptions::default().apply(vec![older.clone(), newer_a.clone(), newer_b.clone()]);
        let names: Vec<_> = sorted.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["newer b", "newer a", "older"]);

        let opts = QueryOptions {
            sort: SortOrder::UpdatedAsc,
            ..QueryOptions::default()
        };
        let sorted = opts.apply(vec![older, newer_a, newer_b]);
        let names: Vec<_> = sorted.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["newer a", "newer b", "older"]);
    }

    #[test]
    fn test_skip_needs_limit() {
        let all: Vec<_> = (1..=5).map(|i| tx("t", i, i, i)).collect();

        let skip_only = QueryOptions {
            skip: 2,
            ..QueryOptions::default()
        };
        assert_eq!(skip_only.apply(all.clone()).len(), 5);

        let page = QueryOptions {
            skip: 2,
            limit: Some(2),
            ..QueryOptions::default()
        };
        let dates: Vec<_> = page.apply(all).iter().map(|t| t.date.timestamp_millis()).collect();
        assert_eq!(dates, vec![3, 2]);
    }
}
