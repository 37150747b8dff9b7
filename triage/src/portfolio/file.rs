//! File-backed store for authenticated users.
//!
//! One pretty-printed JSON document per user under a root directory, named
//! by the blake3 hash of the owner so distinct ids never share a file. Writes
//! go to a sibling temp file which is then renamed over the document, and a
//! single async mutex serializes every read-modify-write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::{
    apply_to, insert_named, resolve_index, PortfolioStore, StoreError, StoreResult,
};
use super::types::{Mutation, MutationOutcome, OwnerRef, Portfolio};

/// On-disk document for one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OwnerDocument {
    owner: OwnerRef,
    portfolios: Vec<Portfolio>,
    updated_at: DateTime<Utc>,
}

/// Persisted portfolio state.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if missing.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "opened portfolio file store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document path for `owner`.
    pub fn path_for(&self, owner: &OwnerRef) -> PathBuf {
        let digest = blake3::hash(owner.to_string().as_bytes());
        self.root
            .join(format!("{}-{}.json", owner.kind(), digest.to_hex()))
    }

    async fn load(&self, owner: &OwnerRef) -> StoreResult<Vec<Portfolio>> {
        let path = self.path_for(owner);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => {
                let doc: OwnerDocument = serde_json::from_str(&json)?;
                if doc.owner != *owner {
                    warn!(path = %path.display(), "portfolio document belongs to another owner");
                    return Err(StoreError::OwnerMismatch {
                        expected: owner.to_string(),
                        found: doc.owner.to_string(),
                    });
                }
                Ok(doc.portfolios)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, owner: &OwnerRef, portfolios: &[Portfolio]) -> StoreResult<()> {
        let path = self.path_for(owner);
        let doc = OwnerDocument {
            owner: owner.clone(),
            portfolios: portfolios.to_vec(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "persisted portfolios");
        Ok(())
    }
}

#[async_trait]
impl PortfolioStore for FileStore {
    async fn get_portfolio(
        &self,
        owner: &OwnerRef,
        name: Option<&str>,
    ) -> StoreResult<Option<Portfolio>> {
        let _guard = self.write_lock.lock().await;
        let mut portfolios = self.load(owner).await?;
        let (idx, created) = resolve_index(&mut portfolios, name);
        if created {
            self.save(owner, &portfolios).await?;
        }
        Ok(idx.map(|i| portfolios[i].clone()))
    }

    async fn list_portfolios(&self, owner: &OwnerRef) -> StoreResult<Vec<Portfolio>> {
        let _guard = self.write_lock.lock().await;
        self.load(owner).await
    }

    async fn create_portfolio(&self, owner: &OwnerRef, name: &str) -> StoreResult<Portfolio> {
        let _guard = self.write_lock.lock().await;
        let mut portfolios = self.load(owner).await?;
        let created = insert_named(&mut portfolios, name)?;
        self.save(owner, &portfolios).await?;
        Ok(created)
    }

    async fn mutate_portfolio(
        &self,
        owner: &OwnerRef,
        portfolio_id: &str,
        mutation: &Mutation,
    ) -> StoreResult<MutationOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut portfolios = self.load(owner).await?;
        let outcome = apply_to(&mut portfolios, portfolio_id, mutation)?;
        self.save(owner, &portfolios).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::types::Holding;
    use rust_decimal::Decimal;

    fn user(id: &str) -> OwnerRef {
        OwnerRef::User(id.into())
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            let p = store.get_portfolio(&user("u1"), None).await.unwrap().unwrap();
            store
                .mutate_portfolio(
                    &user("u1"),
                    &p.id,
                    &Mutation::AddHolding(Holding::stock(
                        "AAPL",
                        Decimal::from(10),
                        Some(Decimal::from(150)),
                    )),
                )
                .await
                .unwrap();
        }

        let reopened = FileStore::open(dir.path()).await.unwrap();
        let p = reopened
            .get_portfolio(&user("u1"), None)
            .await
            .unwrap()
            .unwrap();
        let h = p.holding("AAPL").unwrap();
        assert_eq!(h.quantity, Decimal::from(10));
        assert_eq!(h.avg_cost, Some(Decimal::from(150)));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let p = store.get_portfolio(&user("u1"), None).await.unwrap().unwrap();
        let err = store
            .mutate_portfolio(
                &user("u1"),
                &p.id,
                &Mutation::RemoveHolding {
                    symbol: "TSLA".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::HoldingNotFound("TSLA".into()));
        assert!(!store.path_for(&user("u1")).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_owner_ids_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .create_portfolio(&user("../escape"), "Growth")
            .await
            .unwrap();
        let path = store.path_for(&user("../escape"));
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
        assert!(!dir.path().parent().unwrap().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_similar_owner_ids_do_not_share_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let ids = ["alice.smith", "alice_smith", "alice@smith"];
        let paths: std::collections::HashSet<_> =
            ids.iter().map(|id| store.path_for(&user(id))).collect();
        assert_eq!(paths.len(), ids.len());
        assert_ne!(
            store.path_for(&user("g1")),
            store.path_for(&OwnerRef::Guest("g1".into()))
        );

        let p = store
            .get_portfolio(&user("alice.smith"), None)
            .await
            .unwrap()
            .unwrap();
        store
            .mutate_portfolio(
                &user("alice.smith"),
                &p.id,
                &Mutation::AddHolding(Holding::stock("AAPL", Decimal::from(10), None)),
            )
            .await
            .unwrap();

        for other in ["alice_smith", "alice@smith"] {
            assert!(store.list_portfolios(&user(other)).await.unwrap().is_empty());
            let err = store
                .mutate_portfolio(
                    &user(other),
                    &p.id,
                    &Mutation::RemoveHolding {
                        symbol: "AAPL".into(),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err, StoreError::PortfolioNotFound(p.id.clone()));
        }
        let kept = store.list_portfolios(&user("alice.smith")).await.unwrap();
        assert!(kept[0].holding("AAPL").is_some());
    }

    #[tokio::test]
    async fn test_document_for_another_owner_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.create_portfolio(&user("bob"), "Growth").await.unwrap();
        tokio::fs::copy(store.path_for(&user("bob")), store.path_for(&user("eve")))
            .await
            .unwrap();

        let err = store.list_portfolios(&user("eve")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::OwnerMismatch {
                expected: "user:eve".into(),
                found: "user:bob".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_corrupt_document_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        tokio::fs::write(store.path_for(&user("u1")), "{not json")
            .await
            .unwrap();
        let err = store.list_portfolios(&user("u1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
