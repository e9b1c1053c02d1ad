//! Idempotency store contract and the in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use warden_core::config::IdempotencyConfig;

use crate::error::StoreError;
use crate::types::ActionResult;

/// Cache of completed results keyed by idempotency key.
///
/// Eviction is the store's own business; the executor only reads and writes.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ActionResult>, StoreError>;
    async fn set(&self, key: &str, result: &ActionResult) -> Result<(), StoreError>;
}

struct CachedResult {
    result: ActionResult,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedResult>,
    order: VecDeque<String>,
}

/// Bounded in-process store with optional expiry.
///
/// When full, the oldest stored key is evicted first.
pub struct MemoryIdempotencyStore {
    state: Mutex<CacheState>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl MemoryIdempotencyStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_entries: max_entries.max(1),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn from_config(config: &IdempotencyConfig) -> Self {
        let store = Self::new(config.max_entries);
        if config.ttl_secs == 0 {
            store
        } else {
            store.with_ttl(Duration::from_secs(config.ttl_secs))
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CachedResult) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::from_config(&IdempotencyConfig::default())
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<ActionResult>, StoreError> {
        let mut state = self.lock();
        let expired = match state.entries.get(key) {
            None => return Ok(None),
            Some(entry) => self.is_expired(entry),
        };
        if expired {
            state.entries.remove(key);
            state.order.retain(|k| k != key);
            tracing::debug!(key, "Idempotency entry expired");
            return Ok(None);
        }
        Ok(state.entries.get(key).map(|entry| entry.result.clone()))
    }

    async fn set(&self, key: &str, result: &ActionResult) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.entries.contains_key(key) {
            state.order.retain(|k| k != key);
        }
        state.entries.insert(
            key.to_string(),
            CachedResult {
                result: result.clone(),
                stored_at: Instant::now(),
            },
        );
        state.order.push_back(key.to_string());

        while state.entries.len() > self.max_entries {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                    tracing::debug!(key = %oldest, "Idempotency entry evicted");
                }
                None => break,
            }
        }
        Ok(())
    }
}
