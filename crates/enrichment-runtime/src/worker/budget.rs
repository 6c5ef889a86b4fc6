//! Budget gate: checks daily/monthly request counts and USD spend
//! against configured caps before the worker claims new items.

use crate::config::BudgetConfig;
use crate::store::EnrichmentStore;
use crate::types::BudgetError;

pub async fn check_daily_limits(store: &dyn EnrichmentStore, budget: &BudgetConfig) -> Result<(), BudgetError> {
    let count = store
        .get_daily_enrichment_count()
        .await
        .unwrap_or(0);
    if count >= budget.daily_limit {
        return Err(BudgetError::DailyLimitReached {
            count,
            limit: budget.daily_limit,
        });
    }
    let spent = store.get_daily_enrichment_cost().await.unwrap_or(0.0);
    if spent >= budget.daily_cap_usd {
        return Err(BudgetError::DailyBudgetExceeded {
            spent,
            cap: budget.daily_cap_usd,
        });
    }
    Ok(())
}

pub async fn check_monthly_limits(store: &dyn EnrichmentStore, budget: &BudgetConfig) -> Result<(), BudgetError> {
    let count = store
        .get_monthly_enrichment_count()
        .await
        .unwrap_or(0);
    if count >= budget.monthly_limit {
        return Err(BudgetError::MonthlyLimitReached {
            count,
            limit: budget.monthly_limit,
        });
    }
    let spent = store.get_monthly_enrichment_cost().await.unwrap_or(0.0);
    if spent >= budget.monthly_cap_usd {
        return Err(BudgetError::MonthlyBudgetExceeded {
            spent,
            cap: budget.monthly_cap_usd,
        });
    }
    Ok(())
}

/// Runs the daily gate then the monthly gate, short-circuiting on the
/// first violation.
pub async fn check_budget(store: &dyn EnrichmentStore, budget: &BudgetConfig) -> Result<(), BudgetError> {
    check_daily_limits(store, budget).await?;
    check_monthly_limits(store, budget).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn passes_when_under_every_cap() {
        let store = InMemoryStore::default();
        let budget = BudgetConfig::default();
        assert!(check_budget(&store, &budget).await.is_ok());
    }

    #[tokio::test]
    async fn blocks_when_daily_count_reaches_limit() {
        let store = InMemoryStore::default();
        let mut budget = BudgetConfig::default();
        budget.daily_limit = 1;
        store.increment_enrichment_usage("yacy", 0.0).await.unwrap();
        let result = check_budget(&store, &budget).await;
        assert!(matches!(result, Err(BudgetError::DailyLimitReached { .. })));
    }
}
