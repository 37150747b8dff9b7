//! In-memory store for guest sessions.
//!
//! Nothing here outlives the process. Sessions are keyed by the owner's
//! display form so a guest id can never collide with a user id. A session
//! entry exists only once something was created for it (the default
//! portfolio or a named one); the host drops it with
//! [`GuestStore::end_session`] when the guest leaves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::store::{
    apply_to, insert_named, resolve_index, PortfolioStore, StoreError, StoreResult,
};
use super::types::{Mutation, MutationOutcome, OwnerRef, Portfolio};

/// Ephemeral portfolio state for guest sessions.
#[derive(Debug, Default)]
pub struct GuestStore {
    sessions: RwLock<HashMap<String, Vec<Portfolio>>>,
}

impl GuestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of sessions holding any state.
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop all state for a guest session.
    pub fn end_session(&self, owner: &OwnerRef) -> StoreResult<bool> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions.remove(&owner.to_string()).is_some())
    }
}

#[async_trait]
impl PortfolioStore for GuestStore {
    async fn get_portfolio(
        &self,
        owner: &OwnerRef,
        name: Option<&str>,
    ) -> StoreResult<Option<Portfolio>> {
        let key = owner.to_string();
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let existing = sessions.get_mut(&key);
        let is_new = existing.is_none();
        let mut fresh = Vec::new();
        let portfolios = existing.unwrap_or(&mut fresh);
        let (idx, created) = resolve_index(portfolios, name);
        let found = idx.map(|i| portfolios[i].clone());
        if created {
            debug!(owner = %owner, "created default guest portfolio");
            if is_new {
                sessions.insert(key, fresh);
            }
        }
        Ok(found)
    }

    async fn list_portfolios(&self, owner: &OwnerRef) -> StoreResult<Vec<Portfolio>> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions.get(&owner.to_string()).cloned().unwrap_or_default())
    }

    async fn create_portfolio(&self, owner: &OwnerRef, name: &str) -> StoreResult<Portfolio> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        insert_named(sessions.entry(owner.to_string()).or_default(), name)
    }

    async fn mutate_portfolio(
        &self,
        owner: &OwnerRef,
        portfolio_id: &str,
        mutation: &Mutation,
    ) -> StoreResult<MutationOutcome> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let portfolios = sessions
            .get_mut(&owner.to_string())
            .ok_or_else(|| StoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        apply_to(portfolios, portfolio_id, mutation)
    }
}
