//! Price operations.

use chrono::{DateTime, Utc};
use tally_shared::types::{OrganizationId, PriceId, UserId};
use tracing::info;

use super::types::Price;
use crate::ledger::types::is_unset;
use crate::ledger::{LedgerError, LedgerService};
use crate::notify::{Action, Payload};

impl LedgerService {
    /// Records an exchange price. An unset date defaults to now.
    pub async fn create_price(&self, mut price: Price, user_id: UserId) -> Result<Price, LedgerError> {
        if price.id.is_nil() {
            return Err(LedgerError::MissingField("id"));
        }
        if price.org_id.is_nil() {
            return Err(LedgerError::MissingField("orgId"));
        }
        if price.currency.is_empty() {
            return Err(LedgerError::MissingField("currency"));
        }
        price.validate_rate()?;
        self.require_member(price.org_id, user_id).await?;

        let now = Utc::now();
        price.inserted = now;
        price.updated = now;
        if is_unset(price.date) {
            price.date = now;
        }
        self.store.insert_price(&price).await?;

        info!(price_id = %price.id, org_id = %price.org_id, currency = %price.currency, "Price created");
        self.notify(price.org_id, Action::Create, Payload::Price(price.clone()))
            .await;
        Ok(price)
    }

    /// Removes a price.
    pub async fn delete_price(&self, id: PriceId, user_id: UserId) -> Result<(), LedgerError> {
        let price = self
            .store
            .get_price(id)
            .await?
            .ok_or(LedgerError::PriceNotFound(id))?;
        self.require_member(price.org_id, user_id).await?;
        self.store.delete_price(id).await?;

        info!(price_id = %id, org_id = %price.org_id, "Price deleted");
        self.notify(price.org_id, Action::Delete, Payload::Price(price))
            .await;
        Ok(())
    }

    /// For each currency, the price closest to `date`.
    pub async fn get_prices_nearest_in_time(
        &self,
        org_id: OrganizationId,
        date: DateTime<Utc>,
        user_id: UserId,
    ) -> Result<Vec<Price>, LedgerError> {
        self.require_member(org_id, user_id).await?;
        Ok(self.store.prices_nearest_in_time(org_id, date).await?)
    }

    /// Price history of one currency, oldest first.
    pub async fn get_prices_by_currency(
        &self,
        org_id: OrganizationId,
        currency: &str,
        user_id: UserId,
    ) -> Result<Vec<Price>, LedgerError> {
        self.require_member(org_id, user_id).await?;
        Ok(self.store.prices_by_currency(org_id, currency).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EntityKind;
    use crate::testing::Harness;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_price_defaults_date() {
        let mut h = Harness::new().await;
        h.drain();
        let price = h
            .service
            .create_price(Price::new(h.org.id, "EUR", 1.1), h.user)
            .await
            .unwrap();
        assert_eq!(price.date, price.inserted);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EntityKind::Price);
    }

    #[tokio::test]
    async fn test_create_price_validation() {
        let h = Harness::new().await;
        let err = h
            .service
            .create_price(Price::new(h.org.id, "", 1.1), h.user)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "currency required");

        let err = h
            .service
            .create_price(Price::new(h.org.id, "EUR", -1.0), h.user)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPrice));

        let err = h
            .service
            .create_price(Price::new(h.org.id, "EUR", 1.1), UserId::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User does not belong to org");
    }

    #[tokio::test]
    async fn test_price_listings() {
        let h = Harness::new().await;
        let now = Utc::now();
        for (currency, days, rate) in [("EUR", 30, 1.05), ("EUR", 2, 1.1), ("GBP", 10, 1.3)] {
            let mut price = Price::new(h.org.id, currency, rate);
            price.date = now - Duration::days(days);
            h.service.create_price(price, h.user).await.unwrap();
        }

        let nearest = h
            .service
            .get_prices_nearest_in_time(h.org.id, now, h.user)
            .await
            .unwrap();
        let summary: Vec<_> = nearest.iter().map(|p| (p.currency.as_str(), p.date)).collect();
        assert_eq!(
            summary,
            vec![("EUR", now - Duration::days(2)), ("GBP", now - Duration::days(10))]
        );

        let history = h
            .service
            .get_prices_by_currency(h.org.id, "EUR", h.user)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].date < history[1].date);
    }

    #[tokio::test]
    async fn test_delete_price() {
        let h = Harness::new().await;
        let price = h
            .service
            .create_price(Price::new(h.org.id, "EUR", 1.1), h.user)
            .await
            .unwrap();

        let err = h.service.delete_price(price.id, UserId::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotOrgMember));

        h.service.delete_price(price.id, h.user).await.unwrap();
        let err = h.service.delete_price(price.id, h.user).await.unwrap_err();
        assert!(matches!(err, LedgerError::PriceNotFound(_)));
    }
}
