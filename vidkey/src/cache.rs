use crate::{resolver::Resolution, token::VerifiedToken};
use parking_lot::RwLock;
use std::{
    borrow::Borrow,
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

/// Default lifetime of a completed resolution.
pub const RESULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default lifetime of a verified token.
pub const TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Completed resolutions keyed by [`ResolutionRequest::cache_key`](crate::ResolutionRequest::cache_key).
pub type ResultCache = TtlCache<String, Resolution>;
/// Verified tokens keyed by the submitted token string.
pub type TokenCache = TtlCache<String, VerifiedToken>;

#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Map whose entries silently expire `ttl` after they were stored.
///
/// Expired entries are only dropped when they are looked up again, there is
/// no background sweep and no bound on the number of entries.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_fresh(self.ttl, now) => return Some(entry.value.clone()),
                Some(_) => (),
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        // another task may have refreshed it between the two locks
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.ttl, Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, replacing whatever was there.
    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.write().remove(key).map(|x| x.value)
    }

    /// Any live entry. Expired entries met on the way are dropped.
    pub fn find_live(&self) -> Option<(K, V)>
    where
        K: Clone,
    {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.is_fresh(self.ttl, now));
        entries
            .iter()
            .next()
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
