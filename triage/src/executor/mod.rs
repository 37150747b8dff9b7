//! Command executor: validated, at-most-one-effect application of a
//! command candidate to portfolio state.
//!
//! The executor picks a store from the owner variant (guest sessions go to
//! the in-memory store, users to the persisted one), performs one lookup and
//! at most one mutation, and never retries.

pub mod validation;

use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::PortfolioContext;
use crate::error::{ErrorReport, ExecutionError, FailureCategory};
use crate::extractor::{Action, CommandCandidate};
use crate::portfolio::{
    format_money, format_quantity, Holding, Mutation, MutationOutcome, OwnerRef, Portfolio,
    SharedPortfolioStore, StoreResult,
};

pub use validation::{check_fields, resolve_owner, validate};

/// One field that changed (or was read, for `show`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Decimal>,
}

impl FieldChange {
    fn new(field: &str, from: Option<Decimal>, to: Option<Decimal>) -> Self {
        Self {
            field: field.to_string(),
            from,
            to,
        }
    }
}

/// Structured echo of a successful command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    pub action: Action,
    pub symbol: String,
    /// Display name of the portfolio acted on.
    pub portfolio: String,
    pub changes: Vec<FieldChange>,
    /// Holding after the command; absent after a remove.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holding: Option<Holding>,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ExecutionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    /// Wall-clock time of the execution step only.
    pub execution_time_ms: f64,
    /// Store calls made.
    pub db_operations: u32,
}

impl ExecutionResult {
    /// Whether state was changed.
    pub fn modified_state(&self) -> bool {
        self.success
            && self
                .data
                .as_ref()
                .is_some_and(|d| d.action.is_mutation())
    }
}

/// Applies command candidates to the right store.
#[derive(Clone)]
pub struct CommandExecutor {
    authenticated: SharedPortfolioStore,
    guest: SharedPortfolioStore,
}

impl CommandExecutor {
    pub fn new(authenticated: SharedPortfolioStore, guest: SharedPortfolioStore) -> Self {
        Self {
            authenticated,
            guest,
        }
    }

    fn store_for(&self, owner: &OwnerRef) -> &SharedPortfolioStore {
        if owner.is_guest() {
            &self.guest
        } else {
            &self.authenticated
        }
    }

    /// Validate and apply `candidate`. Every failure comes back as an
    /// unsuccessful result; nothing here panics or retries.
    pub async fn execute(
        &self,
        candidate: &CommandCandidate,
        user_id: Option<&str>,
        guest_session_id: Option<&str>,
        is_guest_mode: bool,
    ) -> ExecutionResult {
        let start = Instant::now();
        let mut ops = 0u32;
        let outcome = match validate(candidate, user_id, guest_session_id, is_guest_mode) {
            Ok(owner) => self.run(candidate, &owner, &mut ops).await,
            Err(e) => Err(e),
        };
        let execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok((message, data)) => {
                if data.action.is_mutation() {
                    info!(
                        action = %data.action,
                        symbol = %data.symbol,
                        portfolio = %data.portfolio,
                        elapsed_ms = execution_time_ms,
                        "command applied"
                    );
                } else {
                    debug!(symbol = %data.symbol, elapsed_ms = execution_time_ms, "holding read");
                }
                ExecutionResult {
                    success: true,
                    message,
                    data: Some(data),
                    error: None,
                    execution_time_ms,
                    db_operations: ops,
                }
            }
            Err(e) => {
                if e.category() == FailureCategory::Store {
                    warn!(action = %candidate.action, error = %e, "store failure during execution");
                } else {
                    debug!(action = %candidate.action, code = %e.code(), "command rejected");
                }
                ExecutionResult {
                    success: false,
                    message: e.to_string(),
                    data: None,
                    error: Some(e.report()),
                    execution_time_ms,
                    db_operations: ops,
                }
            }
        }
    }

    async fn run(
        &self,
        candidate: &CommandCandidate,
        owner: &OwnerRef,
        ops: &mut u32,
    ) -> Result<(String, ExecutionData), ExecutionError> {
        let store = self.store_for(owner);
        let wanted = candidate.portfolio_name.as_deref();
        let label = wanted.unwrap_or(crate::portfolio::DEFAULT_PORTFOLIO_NAME);

        *ops += 1;
        let portfolio = store
            .get_portfolio(owner, wanted)
            .await
            .map_err(|e| ExecutionError::from_store(e, label))?
            .ok_or_else(|| ExecutionError::PortfolioNotFound {
                name: label.to_string(),
            })?;

        let symbol = candidate.symbol.to_uppercase();
        let mutation = match candidate.action {
            Action::Show => return show(&portfolio, &symbol),
            Action::Add => Mutation::AddHolding(Holding {
                symbol: symbol.clone(),
                // Validation guarantees a positive quantity for adds.
                quantity: candidate.quantity.unwrap_or(Decimal::ZERO),
                avg_cost: candidate.avg_cost,
                asset_type: candidate.asset_type,
                option: candidate.option.clone(),
                bond: candidate.bond.clone(),
            }),
            Action::Remove => Mutation::RemoveHolding {
                symbol: symbol.clone(),
            },
            Action::Update => Mutation::UpdateHolding {
                symbol: symbol.clone(),
                quantity: candidate.quantity,
                avg_cost: candidate.avg_cost,
            },
        };

        *ops += 1;
        let outcome = store
            .mutate_portfolio(owner, &portfolio.id, &mutation)
            .await
            .map_err(|e| ExecutionError::from_store(e, &portfolio.name))?;

        Ok(describe_outcome(
            candidate.action,
            &symbol,
            &portfolio.name,
            outcome,
        ))
    }

    /// Portfolio context for an escalated message. Returns the number of
    /// store calls alongside.
    pub async fn portfolio_context(&self, owner: &OwnerRef) -> (PortfolioContext, u32) {
        let listed: StoreResult<Vec<Portfolio>> =
            self.store_for(owner).list_portfolios(owner).await;
        match listed {
            Ok(portfolios) => (PortfolioContext::new(owner.clone(), &portfolios), 1),
            Err(e) => {
                warn!(owner = %owner, error = %e, "portfolio context unavailable");
                (PortfolioContext::empty(owner.clone()), 1)
            }
        }
    }
}

fn show(portfolio: &Portfolio, symbol: &str) -> Result<(String, ExecutionData), ExecutionError> {
    let holding = portfolio
        .holding(symbol)
        .cloned()
        .ok_or_else(|| ExecutionError::HoldingNotFound {
            symbol: symbol.to_string(),
            portfolio: portfolio.name.clone(),
        })?;
    let message = format!("You have {} in {}.", holding.describe(), portfolio.name);
    let data = ExecutionData {
        action: Action::Show,
        symbol: holding.symbol.clone(),
        portfolio: portfolio.name.clone(),
        changes: vec![
            FieldChange::new("quantity", None, Some(holding.quantity)),
            FieldChange::new("avg_cost", None, holding.avg_cost),
        ],
        holding: Some(holding),
    };
    Ok((message, data))
}

fn describe_outcome(
    action: Action,
    symbol: &str,
    portfolio: &str,
    outcome: MutationOutcome,
) -> (String, ExecutionData) {
    let MutationOutcome { before, after } = outcome;
    let qty = |h: &Option<Holding>| h.as_ref().map(|h| h.quantity);
    let cost = |h: &Option<Holding>| h.as_ref().and_then(|h| h.avg_cost);

    let mut changes = Vec::new();
    if qty(&before) != qty(&after) {
        changes.push(FieldChange::new("quantity", qty(&before), qty(&after)));
    }
    if cost(&before) != cost(&after) {
        changes.push(FieldChange::new("avg_cost", cost(&before), cost(&after)));
    }

    let message = match (action, &before, &after) {
        (Action::Add, None, Some(a)) => format!("Added {} to {}.", a.describe(), portfolio),
        (Action::Add, Some(_), Some(a)) => {
            format!("Added to {} in {}. You now hold {}.", symbol, portfolio, a.describe())
        }
        (Action::Remove, Some(b), _) => format!("Removed {} from {}.", b.describe(), portfolio),
        (Action::Update, _, Some(a)) => {
            let mut parts = Vec::new();
            for change in &changes {
                let render = |v: Option<Decimal>| match (change.field.as_str(), v) {
                    (_, None) => "none".to_string(),
                    ("avg_cost", Some(v)) => format_money(v),
                    (_, Some(v)) => format_quantity(v),
                };
                let label = if change.field == "avg_cost" {
                    "average cost"
                } else {
                    "quantity"
                };
                parts.push(format!("{} {} → {}", label, render(change.from), render(change.to)));
            }
            if parts.is_empty() {
                format!("{} in {} is unchanged: {}.", symbol, portfolio, a.describe())
            } else {
                format!("Updated {} in {}: {}.", symbol, portfolio, parts.join(", "))
            }
        }
        _ => format!("{} {} in {}.", action, symbol, portfolio),
    };

    let data = ExecutionData {
        action,
        symbol: symbol.to_string(),
        portfolio: portfolio.to_string(),
        changes,
        holding: after,
    };
    (message, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::portfolio::GuestStore;
    use std::str::FromStr;
    use std::sync::Arc;

    fn dec(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    fn executor() -> CommandExecutor {
        CommandExecutor::new(Arc::new(GuestStore::new()), Arc::new(GuestStore::new()))
    }

    fn add(symbol: &str, qty: &str, cost: Option<&str>) -> CommandCandidate {
        let c = CommandCandidate::new(Action::Add, symbol).with_quantity(dec(qty));
        match cost {
            Some(cost) => c.with_avg_cost(dec(cost)),
            None => c,
        }
    }

    #[tokio::test]
    async fn test_add_then_show_round_trip() {
        let ex = executor();
        let r = ex
            .execute(&add("AAPL", "10.25", Some("150.10")), None, Some("g1"), true)
            .await;
        assert!(r.success, "{}", r.message);
        assert!(r.modified_state());
        assert_eq!(r.db_operations, 2);
        assert_eq!(r.message, "Added 10.25 shares of AAPL at $150.10 to Main Portfolio.");

        let r = ex
            .execute(
                &CommandCandidate::new(Action::Show, "aapl"),
                None,
                Some("g1"),
                true,
            )
            .await;
        assert!(r.success);
        assert!(!r.modified_state());
        let h = r.data.unwrap().holding.unwrap();
        assert_eq!(h.quantity, dec("10.25"));
        assert_eq!(h.avg_cost, Some(dec("150.10")));
    }

    #[tokio::test]
    async fn test_add_merges() {
        let ex = executor();
        ex.execute(&add("MSFT", "10", Some("100")), Some("u1"), None, false)
            .await;
        let r = ex
            .execute(&add("MSFT", "30", Some("200")), Some("u1"), None, false)
            .await;
        assert!(r.success);
        let data = r.data.unwrap();
        assert_eq!(data.holding.unwrap().avg_cost, Some(dec("175")));
        assert!(data
            .changes
            .iter()
            .any(|c| c.field == "quantity" && c.from == Some(dec("10")) && c.to == Some(dec("40"))));
        assert!(r.message.contains("You now hold 40 shares of MSFT at $175.00"));
    }

    #[tokio::test]
    async fn test_remove_twice() {
        let ex = executor();
        ex.execute(&add("TSLA", "5", None), Some("u1"), None, false)
            .await;
        let remove = CommandCandidate::new(Action::Remove, "TSLA");
        let first = ex.execute(&remove, Some("u1"), None, false).await;
        assert!(first.success);
        assert!(first.modified_state());

        let second = ex.execute(&remove, Some("u1"), None, false).await;
        assert!(!second.success);
        assert_eq!(second.error.unwrap().code, ErrorCode::HoldingNotFound);
    }

    #[tokio::test]
    async fn test_update_reports_changes() {
        let ex = executor();
        ex.execute(&add("NVDA", "3", Some("400")), Some("u1"), None, false)
            .await;
        let update = CommandCandidate::new(Action::Update, "NVDA").with_quantity(dec("5"));
        let r = ex.execute(&update, Some("u1"), None, false).await;
        assert!(r.success);
        assert_eq!(r.message, "Updated NVDA in Main Portfolio: quantity 3 → 5.");
    }

    #[tokio::test]
    async fn test_update_missing_holding() {
        let ex = executor();
        let update = CommandCandidate::new(Action::Update, "NVDA").with_quantity(dec("5"));
        let r = ex.execute(&update, Some("u1"), None, false).await;
        assert_eq!(r.error.unwrap().code, ErrorCode::HoldingNotFound);
    }

    #[tokio::test]
    async fn test_unknown_portfolio_is_failure() {
        let ex = executor();
        let c = add("AAPL", "1", None).in_portfolio("retirement");
        let r = ex.execute(&c, Some("u1"), None, false).await;
        assert!(!r.success);
        assert_eq!(r.error.unwrap().code, ErrorCode::PortfolioNotFound);
        assert_eq!(r.db_operations, 1);
    }

    #[tokio::test]
    async fn test_validation_failure_touches_no_store() {
        let ex = executor();
        let r = ex
            .execute(&CommandCandidate::new(Action::Add, "AAPL"), Some("u1"), None, false)
            .await;
        assert!(!r.success);
        assert_eq!(r.db_operations, 0);
        assert!(r.message.contains("how many shares of AAPL"));
    }

    #[tokio::test]
    async fn test_guest_and_user_state_separate() {
        let ex = executor();
        ex.execute(&add("AAPL", "1", None), None, Some("g1"), true)
            .await;
        let r = ex
            .execute(&CommandCandidate::new(Action::Show, "AAPL"), Some("g1"), None, false)
            .await;
        assert_eq!(r.error.unwrap().code, ErrorCode::HoldingNotFound);
    }

    #[tokio::test]
    async fn test_portfolio_context() {
        let ex = executor();
        ex.execute(&add("AAPL", "2", None), Some("u1"), None, false)
            .await;
        let (ctx, ops) = ex.portfolio_context(&OwnerRef::User("u1".into())).await;
        assert_eq!(ops, 1);
        assert_eq!(ctx.portfolios.len(), 1);
        assert_eq!(ctx.portfolios[0].holdings, vec!["2 shares of AAPL".to_string()]);
    }
}
