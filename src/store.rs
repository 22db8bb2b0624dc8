//! Persistence boundary for chain and bale records.
//!
//! The durable backend is an external collaborator; the core only
//! requires the [`ChainStore`] contract, including the single-writer
//! atomicity the engine relies on: `save_chain_state` must reject a
//! stale chain version so two concurrent completion notifications can
//! never double-advance a chain. [`MemoryStore`] is the in-process
//! implementation used by tests and the demo CLI.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::chain::{Bale, Chain};
use crate::error::StoreError;

/// Storage contract for chains and their bale sequences, keyed by
/// `(chain_id, index)`.
#[allow(async_fn_in_trait)]
pub trait ChainStore: Send + Sync {
    /// Persist a new chain together with its resolved bales.
    async fn create_chain(&self, chain: Chain, bales: Vec<Bale>) -> Result<String, StoreError>;

    async fn load_chain(&self, chain_id: &str) -> Result<Chain, StoreError>;

    async fn load_bale(&self, chain_id: &str, index: usize) -> Result<Bale, StoreError>;

    /// Persist a chain state transition with an optimistic version
    /// check. On success the chain's version is bumped in place; a
    /// stale version yields [`StoreError::VersionConflict`] and the
    /// transition is not applied.
    async fn save_chain_state(&self, chain: &mut Chain) -> Result<(), StoreError>;

    async fn save_bale_state(&self, bale: &Bale) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Inner {
    chains: HashMap<String, Chain>,
    bales: HashMap<(String, usize), Bale>,
}

/// In-memory store backed by a mutex, with per-chain optimistic
/// versioning.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chains held, for inspection in tests.
    pub fn chain_count(&self) -> usize {
        self.inner.lock().unwrap().chains.len()
    }
}

impl ChainStore for MemoryStore {
    async fn create_chain(&self, chain: Chain, bales: Vec<Bale>) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = chain.id.clone();
        for bale in bales {
            inner.bales.insert((id.clone(), bale.index), bale);
        }
        inner.chains.insert(id.clone(), chain);
        Ok(id)
    }

    async fn load_chain(&self, chain_id: &str) -> Result<Chain, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| StoreError::ChainNotFound(chain_id.to_string()))
    }

    async fn load_bale(&self, chain_id: &str, index: usize) -> Result<Bale, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .bales
            .get(&(chain_id.to_string(), index))
            .cloned()
            .ok_or(StoreError::BaleNotFound {
                chain_id: chain_id.to_string(),
                index,
            })
    }

    async fn save_chain_state(&self, chain: &mut Chain) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .chains
            .get(&chain.id)
            .ok_or_else(|| StoreError::ChainNotFound(chain.id.clone()))?;

        if stored.version != chain.version {
            return Err(StoreError::VersionConflict {
                chain_id: chain.id.clone(),
                expected: chain.version,
                found: stored.version,
            });
        }

        chain.version += 1;
        inner.chains.insert(chain.id.clone(), chain.clone());
        Ok(())
    }

    async fn save_bale_state(&self, bale: &Bale) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (bale.chain_id.clone(), bale.index);
        if !inner.bales.contains_key(&key) {
            return Err(StoreError::BaleNotFound {
                chain_id: bale.chain_id.clone(),
                index: bale.index,
            });
        }
        inner.bales.insert(key, bale.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::chain::{BaleStatus, JobPayload};

    fn chain_with_bales(count: usize) -> (Chain, Vec<Bale>) {
        let chain = Chain::new(count);
        let bales = (0..count)
            .map(|index| Bale {
                chain_id: chain.id.clone(),
                index,
                payload: JobPayload::new(format!("job-{index}")),
                delay_seconds: 0,
                queue: None,
                connection: None,
                status: BaleStatus::Pending,
            })
            .collect();
        (chain, bales)
    }

    #[tokio::test]
    async fn create_and_load_roundtrip() {
        let store = MemoryStore::new();
        let (chain, bales) = chain_with_bales(2);

        let id = store.create_chain(chain.clone(), bales).await.unwrap();
        assert_eq!(id, chain.id);
        assert_eq!(store.chain_count(), 1);

        let loaded = store.load_chain(&id).await.unwrap();
        assert_eq!(loaded.id, chain.id);
        assert_eq!(loaded.bale_count, 2);

        let bale = store.load_bale(&id, 1).await.unwrap();
        assert_eq!(bale.payload.name, "job-1");
    }

    #[tokio::test]
    async fn missing_chain_and_bale() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.load_chain("nope").await,
            Err(StoreError::ChainNotFound(_))
        ));

        let (chain, bales) = chain_with_bales(1);
        let id = store.create_chain(chain, bales).await.unwrap();
        assert!(matches!(
            store.load_bale(&id, 5).await,
            Err(StoreError::BaleNotFound { index: 5, .. })
        ));
    }

    #[tokio::test]
    async fn save_chain_state_bumps_version() {
        let store = MemoryStore::new();
        let (chain, bales) = chain_with_bales(1);
        store.create_chain(chain.clone(), bales).await.unwrap();

        let mut loaded = store.load_chain(&chain.id).await.unwrap();
        assert_eq!(loaded.version, 0);
        loaded.current_index = 0;
        store.save_chain_state(&mut loaded).await.unwrap();
        assert_eq!(loaded.version, 1);

        let reloaded = store.load_chain(&chain.id).await.unwrap();
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let (chain, bales) = chain_with_bales(1);
        store.create_chain(chain.clone(), bales).await.unwrap();

        // Two writers load the same version.
        let mut first = store.load_chain(&chain.id).await.unwrap();
        let mut second = store.load_chain(&chain.id).await.unwrap();

        store.save_chain_state(&mut first).await.unwrap();

        let err = store.save_chain_state(&mut second).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // The losing writer's copy was not bumped and the stored chain
        // reflects only the first write.
        assert_eq!(second.version, 0);
        assert_eq!(store.load_chain(&chain.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn save_bale_state_updates_status() {
        let store = MemoryStore::new();
        let (chain, bales) = chain_with_bales(1);
        store.create_chain(chain.clone(), bales).await.unwrap();

        let mut bale = store.load_bale(&chain.id, 0).await.unwrap();
        bale.status = BaleStatus::Dispatched;
        store.save_bale_state(&bale).await.unwrap();

        assert_eq!(
            store.load_bale(&chain.id, 0).await.unwrap().status,
            BaleStatus::Dispatched
        );
    }

    #[tokio::test]
    async fn save_unknown_bale_fails() {
        let store = MemoryStore::new();
        let bale = Bale {
            chain_id: "ghost".into(),
            index: 0,
            payload: JobPayload::new("ghost"),
            delay_seconds: 0,
            queue: None,
            connection: None,
            status: BaleStatus::Pending,
        };
        assert!(matches!(
            store.save_bale_state(&bale).await,
            Err(StoreError::BaleNotFound { .. })
        ));
    }
}
