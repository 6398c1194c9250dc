//! Balance calculation as of a point in time.
//!
//! Balances are the sum of non-deleted splits dated strictly before the as-of
//! instant. Native balances are either the historical cost (sum of the splits'
//! native amounts) or the balance converted at the price nearest in time.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::LedgerError;
use super::types::Account;
use crate::org::Org;
use crate::store::Datastore;

/// Fills `balance`/`native_balance` on accounts from the datastore.
///
/// Every method mutates in place; a datastore failure aborts the batch.
pub struct BalanceCalculator<'a> {
    store: &'a dyn Datastore,
}

impl<'a> BalanceCalculator<'a> {
    /// Creates a calculator reading from `store`.
    pub fn new(store: &'a dyn Datastore) -> Self {
        Self { store }
    }

    /// Sets `balance` on each account; `None` when it has no splits.
    pub async fn add_balances(
        &self,
        accounts: &mut [Account],
        as_of: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let ids: Vec<_> = accounts.iter().map(|a| a.id).collect();
        let sums = self.store.sum_split_amounts(&ids, as_of).await?;
        for account in accounts {
            account.balance = sums.get(&account.id).copied();
        }
        Ok(())
    }

    /// Single-account form of [`Self::add_balances`].
    pub async fn add_balance(
        &self,
        account: &mut Account,
        as_of: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.add_balances(std::slice::from_mut(account), as_of).await
    }

    /// Sets `native_balance` to the historical cost of each account.
    pub async fn add_native_balances_cost(
        &self,
        accounts: &mut [Account],
        as_of: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let ids: Vec<_> = accounts.iter().map(|a| a.id).collect();
        let sums = self.store.sum_split_native_amounts(&ids, as_of).await?;
        for account in accounts {
            account.native_balance = sums.get(&account.id).copied();
        }
        Ok(())
    }

    /// Single-account form of [`Self::add_native_balances_cost`].
    pub async fn add_native_balance_cost(
        &self,
        account: &mut Account,
        as_of: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.add_native_balances_cost(std::slice::from_mut(account), as_of)
            .await
    }

    /// Converts each account's `balance` at the price nearest to `as_of`.
    ///
    /// Requires `balance` to be filled first.
    pub async fn add_native_balances_nearest_in_time(
        &self,
        org: &Org,
        accounts: &mut [Account],
        as_of: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        for account in accounts {
            self.add_native_balance_nearest_in_time(org, account, as_of)
                .await?;
        }
        Ok(())
    }

    /// Single-account form of [`Self::add_native_balances_nearest_in_time`].
    ///
    /// Absent balance leaves the native balance absent; same currency copies
    /// the balance; no price at all yields zero.
    pub async fn add_native_balance_nearest_in_time(
        &self,
        org: &Org,
        account: &mut Account,
        as_of: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let Some(balance) = account.balance else {
            account.native_balance = None;
            return Ok(());
        };

        if account.currency == org.currency {
            account.native_balance = Some(balance);
            return Ok(());
        }

        let native = match self
            .store
            .nearest_price(org.id, &account.currency, as_of)
            .await?
        {
            Some(price) => convert_to_native(balance, price.price, account.precision, org.precision)?,
            None => 0,
        };
        account.native_balance = Some(native);
        Ok(())
    }
}

/// Converts `balance` (account minor units) into org minor units.
///
/// Computes `balance * price / 10^(account_precision - org_precision)` in
/// exact decimal arithmetic and rounds half away from zero.
pub fn convert_to_native(
    balance: i64,
    price: f64,
    account_precision: u32,
    org_precision: u32,
) -> Result<i64, LedgerError> {
    let rate = Decimal::from_f64(price).ok_or(LedgerError::InvalidPrice)?;
    let mut value = Decimal::from(balance)
        .checked_mul(rate)
        .ok_or(LedgerError::AmountOverflow)?;

    if account_precision >= org_precision {
        let divisor = power_of_ten(account_precision - org_precision)?;
        value = value.checked_div(divisor).ok_or(LedgerError::AmountOverflow)?;
    } else {
        let factor = power_of_ten(org_precision - account_precision)?;
        value = value.checked_mul(factor).ok_or(LedgerError::AmountOverflow)?;
    }

    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(LedgerError::AmountOverflow)
}

fn power_of_ten(exp: u32) -> Result<Decimal, LedgerError> {
    (0..exp)
        .try_fold(Decimal::ONE, |acc, _| acc.checked_mul(Decimal::TEN))
        .ok_or(LedgerError::AmountOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{Split, Transaction};
    use crate::price::Price;
    use crate::store::MemoryDatastore;
    use chrono::Duration;
    use rstest::rstest;
    use tally_shared::types::UserId;

    #[rstest]
    #[case(1000, 2.0, 2, 2, 2000)]
    #[case(1000, 0.5, 2, 2, 500)]
    #[case(-1000, 1.25, 2, 2, -1250)]
    // account has one more decimal place than the org
    #[case(12345, 1.0, 3, 2, 1235)]
    #[case(-12345, 1.0, 3, 2, -1235)]
    // org has more decimal places
    #[case(150, 1.5, 0, 2, 22500)]
    #[case(1, 0.5, 0, 0, 1)]
    #[case(-1, 0.5, 0, 0, -1)]
    #[case(0, 3.0, 8, 2, 0)]
    fn test_convert_to_native(
        #[case] balance: i64,
        #[case] price: f64,
        #[case] account_precision: u32,
        #[case] org_precision: u32,
        #[case] expected: i64,
    ) {
        assert_eq!(
            convert_to_native(balance, price, account_precision, org_precision).unwrap(),
            expected
        );
    }

    #[test]
    fn test_convert_overflow() {
        let err = convert_to_native(i64::MAX, 4.0, 2, 2).unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow));
        assert!(matches!(
            convert_to_native(1, f64::NAN, 2, 2),
            Err(LedgerError::InvalidPrice)
        ));
    }

    struct Books {
        store: MemoryDatastore,
        org: Org,
        cash: Account,
        euro: Account,
        equity: Account,
    }

    async fn books() -> Books {
        let store = MemoryDatastore::new();
        let user = UserId::new();
        let org = Org::new("Acme", "USD", 2);
        let mut accounts = org.standard_accounts(Utc::now());
        let root = accounts[0].id;
        let cash = Account::new(org.id, "Cash", Some(root), "USD", 2, true);
        let euro = Account::new(org.id, "Euro", Some(root), "EUR", 2, true);
        let equity = Account::new(org.id, "Opening", Some(root), "USD", 2, false);
        accounts.extend([cash.clone(), euro.clone(), equity.clone()]);
        store.create_org(&org, user, &accounts).await.unwrap();
        Books { store, org, cash, euro, equity }
    }

    async fn post(store: &MemoryDatastore, org: &Org, date: DateTime<Utc>, splits: Vec<Split>) {
        let mut tx = Transaction::new(org.id, "test", splits);
        tx.date = date;
        tx.inserted = date;
        tx.updated = date;
        tx.attach_splits();
        store.insert_transaction(&tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_balances_before_as_of() {
        let b = books().await;
        let day = Utc::now() - Duration::days(10);
        post(&b.store, &b.org, day, vec![
            Split::new(b.cash.id, 1000, 1000),
            Split::new(b.equity.id, -1000, -1000),
        ])
        .await;
        post(&b.store, &b.org, day + Duration::days(2), vec![
            Split::new(b.cash.id, 500, 500),
            Split::new(b.equity.id, -500, -500),
        ])
        .await;

        let calc = BalanceCalculator::new(&b.store);
        let mut accounts = vec![b.cash.clone(), b.equity.clone(), b.euro.clone()];

        // strictly before: the second posting is excluded on its own date
        calc.add_balances(&mut accounts, day + Duration::days(2)).await.unwrap();
        assert_eq!(accounts[0].balance, Some(1000));
        assert_eq!(accounts[1].balance, Some(-1000));
        assert_eq!(accounts[2].balance, None);

        calc.add_balance(&mut accounts[0], Utc::now()).await.unwrap();
        assert_eq!(accounts[0].balance, Some(1500));
    }

    #[tokio::test]
    async fn test_native_cost_and_nearest_price() {
        let b = books().await;
        let day = Utc::now() - Duration::days(30);
        post(&b.store, &b.org, day, vec![
            Split::new(b.euro.id, 1000, 1100),
            Split::new(b.equity.id, -1100, -1100),
        ])
        .await;

        let calc = BalanceCalculator::new(&b.store);
        let mut euro = b.euro.clone();
        calc.add_balance(&mut euro, Utc::now()).await.unwrap();
        calc.add_native_balance_cost(&mut euro, Utc::now()).await.unwrap();
        assert_eq!(euro.balance, Some(1000));
        assert_eq!(euro.native_balance, Some(1100));

        // no price recorded yet
        calc.add_native_balance_nearest_in_time(&b.org, &mut euro, Utc::now())
            .await
            .unwrap();
        assert_eq!(euro.native_balance, Some(0));

        for (offset, rate) in [(20, 1.5), (5, 1.25)] {
            let mut price = Price::new(b.org.id, "EUR", rate);
            price.date = Utc::now() - Duration::days(offset);
            b.store.insert_price(&price).await.unwrap();
        }
        calc.add_native_balance_nearest_in_time(&b.org, &mut euro, Utc::now())
            .await
            .unwrap();
        assert_eq!(euro.native_balance, Some(1250));

        calc.add_native_balance_nearest_in_time(&b.org, &mut euro, Utc::now() - Duration::days(19))
            .await
            .unwrap();
        assert_eq!(euro.native_balance, Some(1500));
    }

    #[tokio::test]
    async fn test_nearest_in_time_same_currency_and_absent() {
        let b = books().await;
        post(&b.store, &b.org, Utc::now() - Duration::days(1), vec![
            Split::new(b.cash.id, 700, 700),
            Split::new(b.equity.id, -700, -700),
        ])
        .await;

        let calc = BalanceCalculator::new(&b.store);
        let mut accounts = vec![b.cash.clone(), b.euro.clone()];
        calc.add_balances(&mut accounts, Utc::now()).await.unwrap();
        calc.add_native_balances_nearest_in_time(&b.org, &mut accounts, Utc::now())
            .await
            .unwrap();
        assert_eq!(accounts[0].native_balance, Some(700));
        assert_eq!(accounts[1].native_balance, None);
    }
}
