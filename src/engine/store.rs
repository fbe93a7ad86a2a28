use super::matcher::HashedMatcher;
use super::traits::BlocklistMatcher;
use super::validator::{validate, Domain, FormatError};
use crate::config::StorageConfig;
use crate::storage::{KeyValueStore, StorageError};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

pub const DEFAULT_BLOCKLIST_KEY: &str = "blockedDomains";

#[derive(Debug, Error)]
pub enum BlocklistError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{0} is already in your blocked list.")]
    Duplicate(Domain),
    #[error("failed to save blocklist: {0}")]
    Persistence(#[source] StorageError),
    #[error("failed to load blocklist: {0}")]
    Load(#[source] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Loading,
    Ready,
}

/// Published after every change to the in-memory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlocklistEvent {
    Loaded { count: usize },
    Added(Domain),
    Removed(Domain),
}

#[derive(Debug)]
struct Inner {
    state: StoreState,
    domains: Vec<Domain>,
}

/// Owns the blocklist snapshot and mirrors it to a [`KeyValueStore`] slot.
///
/// Mutations queue behind a FIFO async mutex, so two concurrent `add`/`remove`
/// calls never read the same snapshot. The snapshot is replaced only after the
/// storage write has succeeded; dropping an in-flight call leaves it untouched.
pub struct BlocklistStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    timeout: Option<Duration>,
    gate: Mutex<()>,
    inner: RwLock<Inner>,
    events: broadcast::Sender<BlocklistEvent>,
}

impl BlocklistStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            storage,
            key: key.into(),
            timeout: None,
            gate: Mutex::new(()),
            inner: RwLock::new(Inner {
                state: StoreState::Ready,
                domains: Vec::new(),
            }),
            events,
        }
    }

    pub fn from_config(storage: Arc<dyn KeyValueStore>, config: &StorageConfig) -> Self {
        let store = Self::new(storage, config.blocklist_key.clone());
        match config.timeout_ms {
            0 => store,
            ms => store.with_timeout(Duration::from_millis(ms)),
        }
    }

    /// Fails any storage call that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> StoreState {
        self.read_inner().state
    }

    /// Last-known-good snapshot, in insertion order.
    pub fn list(&self) -> Vec<Domain> {
        self.read_inner().domains.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlocklistEvent> {
        self.events.subscribe()
    }

    /// Builds a matcher over the current snapshot.
    pub fn matcher(&self) -> Arc<dyn BlocklistMatcher> {
        let inner = self.read_inner();
        Arc::new(HashedMatcher::new(&inner.domains))
    }

    /// Reads the persisted record into the snapshot.
    ///
    /// A failed read leaves an empty snapshot and returns
    /// [`BlocklistError::Load`]; the store is usable either way.
    pub async fn load(&self) -> Result<Vec<Domain>, BlocklistError> {
        let _turn = self.gate.lock().await;
        let _loading = LoadingGuard::enter(self);

        info!("Loading blocklist from '{}'...", self.key);
        match self.fetch().await {
            Ok(domains) => {
                info!("Loaded {} blocked domains", domains.len());
                let count = domains.len();
                self.replace(domains.clone());
                let _ = self.events.send(BlocklistEvent::Loaded { count });
                Ok(domains)
            }
            Err(e) => {
                error!("Error loading domains: {}", e);
                self.replace(Vec::new());
                let _ = self.events.send(BlocklistEvent::Loaded { count: 0 });
                Err(BlocklistError::Load(e))
            }
        }
    }

    /// Validates `raw` and appends it to the persisted list.
    pub async fn add(&self, raw: &str) -> Result<Vec<Domain>, BlocklistError> {
        let domain = validate(raw)?;

        let _turn = self.gate.lock().await;
        let mut candidate = self.list();
        if candidate.contains(&domain) {
            debug!("Rejected duplicate domain {}", domain);
            return Err(BlocklistError::Duplicate(domain));
        }
        candidate.push(domain.clone());

        if let Err(e) = self.persist(&candidate).await {
            error!("Error saving domain {}: {}", domain, e);
            return Err(BlocklistError::Persistence(e));
        }

        self.replace(candidate.clone());
        info!("Added {} to blocklist ({} total)", domain, candidate.len());
        let _ = self.events.send(BlocklistEvent::Added(domain));
        Ok(candidate)
    }

    /// Removes `target`. Removing an absent domain is a no-op and skips the write.
    pub async fn remove(&self, target: &Domain) -> Result<Vec<Domain>, BlocklistError> {
        let _turn = self.gate.lock().await;
        let mut candidate = self.list();
        let Some(pos) = candidate.iter().position(|d| d == target) else {
            debug!("Remove of absent domain {} ignored", target);
            return Ok(candidate);
        };
        candidate.remove(pos);

        if let Err(e) = self.persist(&candidate).await {
            error!("Error removing domain {}: {}", target, e);
            return Err(BlocklistError::Persistence(e));
        }

        self.replace(candidate.clone());
        info!("Removed {} from blocklist ({} left)", target, candidate.len());
        let _ = self.events.send(BlocklistEvent::Removed(target.clone()));
        Ok(candidate)
    }

    async fn fetch(&self) -> Result<Vec<Domain>, StorageError> {
        let value = self.with_deadline(self.storage.get(&self.key)).await?;

        match value {
            Some(value) => parse_record(value),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, candidate: &[Domain]) -> Result<(), StorageError> {
        let value = serde_json::to_value(candidate)?;
        self.with_deadline(self.storage.set(&self.key, value)).await
    }

    async fn with_deadline<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        let Some(limit) = self.timeout else {
            return call.await;
        };
        tokio::time::timeout(limit, call).await.map_err(|_| {
            StorageError::Timeout(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
        })?
    }

    fn replace(&self, domains: Vec<Domain>) {
        self.write_inner().domains = domains;
    }

    fn set_state(&self, state: StoreState) {
        self.write_inner().state = state;
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the store in `Loading` and returns it to `Ready` on drop, including
/// when the load future is abandoned mid-read.
struct LoadingGuard<'a>(&'a BlocklistStore);

impl<'a> LoadingGuard<'a> {
    fn enter(store: &'a BlocklistStore) -> Self {
        store.set_state(StoreState::Loading);
        Self(store)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_state(StoreState::Ready);
    }
}

/// Parses the stored array, dropping entries that no longer validate and
/// repeated entries so the snapshot invariants hold whatever wrote the slot.
fn parse_record(value: Value) -> Result<Vec<Domain>, StorageError> {
    let raw: Vec<String> = serde_json::from_value(value)?;
    let mut domains: Vec<Domain> = Vec::with_capacity(raw.len());

    for entry in raw {
        match validate(&entry) {
            Ok(domain) if domains.contains(&domain) => {
                warn!("Skipping repeated stored domain {}", domain);
            }
            Ok(domain) => domains.push(domain),
            Err(e) => warn!("Skipping invalid stored domain '{}': {}", entry, e),
        }
    }

    Ok(domains)
}
