//! Budget operations.

use chrono::Utc;
use tally_shared::types::{OrganizationId, UserId};
use tracing::info;

use super::types::Budget;
use crate::ledger::{LedgerError, LedgerService};

impl LedgerService {
    /// Replaces the org's budget with `budget`.
    pub async fn create_budget(&self, mut budget: Budget, user_id: UserId) -> Result<Budget, LedgerError> {
        if budget.org_id.is_nil() {
            return Err(LedgerError::MissingField("orgId"));
        }
        self.require_member(budget.org_id, user_id).await?;

        budget.inserted = Utc::now();
        self.store.replace_budget(&budget).await?;

        info!(org_id = %budget.org_id, items = budget.items.len(), "Budget replaced");
        Ok(budget)
    }

    /// The org's budget.
    pub async fn get_budget(&self, org_id: OrganizationId, user_id: UserId) -> Result<Budget, LedgerError> {
        self.require_member(org_id, user_id).await?;
        self.store
            .get_budget(org_id)
            .await?
            .ok_or(LedgerError::BudgetNotFound)
    }

    /// Removes every budget item of the org.
    pub async fn delete_budget(&self, org_id: OrganizationId, user_id: UserId) -> Result<(), LedgerError> {
        self.require_member(org_id, user_id).await?;
        self.store.delete_budget(org_id).await?;
        info!(org_id = %org_id, "Budget deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetItem;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_budget_lifecycle() {
        let h = Harness::new().await;
        let income = h.named("Income").await;
        let expenses = h.named("Expenses").await;

        let err = h.service.get_budget(h.org.id, h.user).await.unwrap_err();
        assert_eq!(err.to_string(), "Budget not found");

        let items = vec![
            BudgetItem { account_id: expenses.id, amount: 50_000 },
            BudgetItem { account_id: income.id, amount: -80_000 },
        ];
        h.service
            .create_budget(Budget::new(h.org.id, items.clone()), h.user)
            .await
            .unwrap();
        let loaded = h.service.get_budget(h.org.id, h.user).await.unwrap();
        assert_eq!(loaded.items, items);

        let replacement = vec![BudgetItem { account_id: income.id, amount: -1 }];
        h.service
            .create_budget(Budget::new(h.org.id, replacement.clone()), h.user)
            .await
            .unwrap();
        assert_eq!(h.service.get_budget(h.org.id, h.user).await.unwrap().items, replacement);

        h.service.delete_budget(h.org.id, h.user).await.unwrap();
        assert!(matches!(
            h.service.get_budget(h.org.id, h.user).await,
            Err(LedgerError::BudgetNotFound)
        ));
    }

    #[tokio::test]
    async fn test_budget_requires_membership() {
        let h = Harness::new().await;
        let err = h
            .service
            .create_budget(Budget::new(h.org.id, vec![]), UserId::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User does not belong to org");
        assert!(h.service.delete_budget(h.org.id, UserId::new()).await.is_err());
    }
}
