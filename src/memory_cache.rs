use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::Cache;
use crate::permission::PermissionCode;
use crate::types::{CompanyId, ScopeNodeId, UserId};

/// In-memory cache for effective permissions and subtree sets.
///
/// This is a simple LRU cache with optional TTL shared by both kinds of
/// entry. It is intended for single-process deployments; a shared cache
/// needs an out-of-process implementation of [`Cache`].
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheState>>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
enum CacheKey {
    Permissions(UserId),
    Subtree(ScopeNodeId),
}

#[derive(Debug, Clone)]
enum CachedValue {
    Permissions(Vec<PermissionCode>),
    Subtree {
        company: CompanyId,
        ids: Vec<ScopeNodeId>,
    },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    updated_at: Instant,
}

impl MemoryCache {
    /// Creates a new cache with the given capacity.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState::default())),
            capacity,
            ttl: None,
        }
    }

    /// Configures a time-to-live for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_key(state: &mut CacheState, key: &CacheKey) {
        if state.entries.remove(key).is_some() {
            state.order.retain(|existing| existing != key);
        }
    }

    fn touch(state: &mut CacheState, key: CacheKey) {
        state.order.retain(|existing| *existing != key);
        state.order.push_back(key);
    }

    fn is_expired(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.updated_at) > ttl
    }

    fn prune_expired(state: &mut CacheState, ttl: Duration, now: Instant) {
        state
            .entries
            .retain(|_, entry| !Self::is_expired(entry, ttl, now));
        state.order.retain(|key| state.entries.contains_key(key));
    }

    fn evict_if_needed(state: &mut CacheState, capacity: usize) {
        while state.entries.len() > capacity {
            if let Some(key) = state.order.pop_front() {
                state.entries.remove(&key);
            } else {
                break;
            }
        }
    }

    fn get(&self, key: CacheKey) -> Option<CachedValue> {
        if self.capacity == 0 {
            return None;
        }

        let now = Instant::now();
        let mut guard = self.lock();

        if let Some(ttl) = self.ttl
            && let Some(entry) = guard.entries.get(&key)
            && Self::is_expired(entry, ttl, now)
        {
            Self::remove_key(&mut guard, &key);
            return None;
        }

        let value = guard.entries.get(&key).map(|entry| entry.value.clone());
        if value.is_some() {
            Self::touch(&mut guard, key);
        }
        value
    }

    fn set(&self, key: CacheKey, value: CachedValue) {
        if self.capacity == 0 {
            return;
        }

        let now = Instant::now();
        let mut guard = self.lock();

        if let Some(ttl) = self.ttl {
            Self::prune_expired(&mut guard, ttl, now);
        }

        guard.entries.insert(
            key,
            CacheEntry {
                value,
                updated_at: now,
            },
        );
        Self::touch(&mut guard, key);
        Self::evict_if_needed(&mut guard, self.capacity);
    }

    fn remove_where(&self, predicate: impl Fn(&CacheKey, &CachedValue) -> bool) {
        let mut guard = self.lock();
        let keys: Vec<CacheKey> = guard
            .entries
            .iter()
            .filter(|(key, entry)| predicate(*key, &entry.value))
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            Self::remove_key(&mut guard, &key);
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_permissions(&self, user: UserId) -> Option<Vec<PermissionCode>> {
        match self.get(CacheKey::Permissions(user))? {
            CachedValue::Permissions(perms) => Some(perms),
            CachedValue::Subtree { .. } => None,
        }
    }

    async fn set_permissions(&self, user: UserId, perms: Vec<PermissionCode>) {
        self.set(CacheKey::Permissions(user), CachedValue::Permissions(perms));
    }

    async fn get_subtree(&self, node: ScopeNodeId) -> Option<Vec<ScopeNodeId>> {
        match self.get(CacheKey::Subtree(node))? {
            CachedValue::Subtree { ids, .. } => Some(ids),
            CachedValue::Permissions(_) => None,
        }
    }

    async fn set_subtree(&self, company: CompanyId, node: ScopeNodeId, ids: Vec<ScopeNodeId>) {
        self.set(CacheKey::Subtree(node), CachedValue::Subtree { company, ids });
    }

    async fn invalidate_user(&self, user: UserId) {
        let mut guard = self.lock();
        Self::remove_key(&mut guard, &CacheKey::Permissions(user));
    }

    async fn invalidate_permissions(&self) {
        self.remove_where(|key, _| matches!(key, CacheKey::Permissions(_)));
    }

    async fn invalidate_company(&self, company: CompanyId) {
        self.remove_where(|_, value| {
            matches!(value, CachedValue::Subtree { company: owner, .. } if *owner == company)
        });
    }
}
