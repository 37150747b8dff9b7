//! Portfolio store capability.
//!
//! The executor only ever talks to `dyn PortfolioStore`. Guest sessions are
//! served by [`super::GuestStore`], authenticated users by
//! [`super::FileStore`]; which one a request uses is decided once, from the
//! [`OwnerRef`] variant.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    normalize_portfolio_name, portfolio_slug, Mutation, MutationOutcome, OwnerRef, Portfolio,
    DEFAULT_PORTFOLIO_ID,
};

/// Error type for portfolio store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Holding not found: {0}")]
    HoldingNotFound(String),

    #[error("Portfolio already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    /// The backing store refused the mutation.
    #[error("Mutation rejected: {0}")]
    Rejected(String),

    /// Combined amounts for a holding exceed what can be represented.
    #[error("Amount out of range for {0}")]
    AmountOutOfRange(String),

    /// A persisted document belongs to a different owner than requested.
    #[error("Document owner mismatch: expected {expected}, found {found}")]
    OwnerMismatch { expected: String, found: String },
}

impl StoreError {
    /// Failures that may succeed if the caller tries again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a store
pub type SharedPortfolioStore = Arc<dyn PortfolioStore>;

/// Read/mutate access to an owner's portfolios.
///
/// Implementations must apply each `mutate_portfolio` call as one atomic
/// read-modify-write and serialize concurrent mutations of the same owner.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Look up a portfolio by name, or the default portfolio when `name` is
    /// `None`. The default portfolio is created on first access; a named
    /// lookup never creates anything and yields `Ok(None)` when unknown.
    async fn get_portfolio(
        &self,
        owner: &OwnerRef,
        name: Option<&str>,
    ) -> StoreResult<Option<Portfolio>>;

    /// All portfolios of an owner, in creation order.
    async fn list_portfolios(&self, owner: &OwnerRef) -> StoreResult<Vec<Portfolio>>;

    /// Create an empty named portfolio.
    async fn create_portfolio(&self, owner: &OwnerRef, name: &str) -> StoreResult<Portfolio>;

    /// Apply a single mutation to the portfolio with `portfolio_id`.
    async fn mutate_portfolio(
        &self,
        owner: &OwnerRef,
        portfolio_id: &str,
        mutation: &Mutation,
    ) -> StoreResult<MutationOutcome>;
}

// ── Helpers shared by store implementations ─────────────────────────────────

/// Resolve a lookup against an owner's portfolios, creating the default
/// portfolio when needed. Returns the index of the match and whether the
/// collection changed.
pub(crate) fn resolve_index(
    portfolios: &mut Vec<Portfolio>,
    name: Option<&str>,
) -> (Option<usize>, bool) {
    match name {
        Some(name) if normalize_portfolio_name(name) == DEFAULT_PORTFOLIO_ID => {
            resolve_index(portfolios, None)
        }
        Some(name) => (portfolios.iter().position(|p| p.matches_name(name)), false),
        None => match portfolios.iter().position(|p| p.id == DEFAULT_PORTFOLIO_ID) {
            Some(idx) => (Some(idx), false),
            None => {
                portfolios.push(Portfolio::default_for_owner());
                (Some(portfolios.len() - 1), true)
            }
        },
    }
}

pub(crate) fn insert_named(portfolios: &mut Vec<Portfolio>, name: &str) -> StoreResult<Portfolio> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Rejected("portfolio name is empty".into()));
    }
    if portfolios.iter().any(|p| p.matches_name(name)) {
        return Err(StoreError::AlreadyExists(name.to_string()));
    }
    let mut id = portfolio_slug(name);
    if id.is_empty() || portfolios.iter().any(|p| p.id == id) {
        id = format!("portfolio-{}", portfolios.len() + 1);
    }
    let portfolio = Portfolio::new(id, name);
    portfolios.push(portfolio.clone());
    Ok(portfolio)
}

pub(crate) fn apply_to(
    portfolios: &mut [Portfolio],
    portfolio_id: &str,
    mutation: &Mutation,
) -> StoreResult<MutationOutcome> {
    portfolios
        .iter_mut()
        .find(|p| p.id == portfolio_id)
        .ok_or_else(|| StoreError::PortfolioNotFound(portfolio_id.to_string()))?
        .apply(mutation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lookup_creates_once() {
        let mut ps = Vec::new();
        assert_eq!(resolve_index(&mut ps, None), (Some(0), true));
        assert_eq!(resolve_index(&mut ps, None), (Some(0), false));
        assert_eq!(ps.len(), 1);
    }

    #[test]
    fn test_default_lookup_ignores_other_portfolios() {
        let mut ps = Vec::new();
        insert_named(&mut ps, "Retirement").unwrap();
        assert_eq!(resolve_index(&mut ps, None), (Some(1), true));
        assert_eq!(ps[1].id, DEFAULT_PORTFOLIO_ID);
    }

    #[test]
    fn test_main_by_name_resolves_default() {
        let mut ps = Vec::new();
        assert_eq!(resolve_index(&mut ps, Some("main")), (Some(0), true));
        assert_eq!(ps[0].id, DEFAULT_PORTFOLIO_ID);
    }

    #[test]
    fn test_named_lookup_never_creates() {
        let mut ps = Vec::new();
        assert_eq!(resolve_index(&mut ps, Some("retirement")), (None, false));
        assert!(ps.is_empty());
    }

    #[test]
    fn test_insert_named_rejects_duplicates() {
        let mut ps = Vec::new();
        let p = insert_named(&mut ps, "Retirement").unwrap();
        assert_eq!(p.id, "retirement");
        let err = insert_named(&mut ps, "retirement portfolio").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn test_apply_to_unknown_portfolio() {
        let mut ps = vec![Portfolio::default_for_owner()];
        let err = apply_to(
            &mut ps,
            "nope",
            &Mutation::RemoveHolding {
                symbol: "AAPL".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, StoreError::PortfolioNotFound("nope".into()));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Io("x".into()).is_transient());
        assert!(!StoreError::LockPoisoned.is_transient());
        assert!(!StoreError::HoldingNotFound("x".into()).is_transient());
    }
}
