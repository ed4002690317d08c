//! Versioned read cache for server-owned entities.
//!
//! Every key carries a version token. A successful mutation bumps the tokens
//! of the keys it affects; an entry is only served while the token it was
//! stored under is still current, otherwise the reader re-fetches.

use std::{collections::HashMap, future::Future};

use shared::domain::ScanId;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ScanList,
    ScanDetail(ScanId),
    Analysis(ScanId),
    Barriers(ScanId),
    Guide(ScanId),
}

/// Server-side mutations the client performs, by what they invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreateScan,
    UpdateScan(ScanId),
    DeleteScan(ScanId),
    ImagesChanged(ScanId),
    AnalysisStarted(ScanId),
    GuideGenerated(ScanId),
}

impl Mutation {
    pub fn affected_keys(self) -> Vec<CacheKey> {
        match self {
            Mutation::CreateScan => vec![CacheKey::ScanList],
            Mutation::UpdateScan(id) => vec![CacheKey::ScanDetail(id), CacheKey::ScanList],
            Mutation::DeleteScan(id) => vec![
                CacheKey::ScanList,
                CacheKey::ScanDetail(id),
                CacheKey::Analysis(id),
                CacheKey::Barriers(id),
                CacheKey::Guide(id),
            ],
            Mutation::ImagesChanged(id) => vec![CacheKey::ScanDetail(id)],
            Mutation::AnalysisStarted(id) => vec![
                CacheKey::ScanDetail(id),
                CacheKey::Analysis(id),
                CacheKey::Barriers(id),
            ],
            Mutation::GuideGenerated(id) => vec![CacheKey::Guide(id)],
        }
    }
}

/// Token captured when a read starts; the result is stored under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket {
    key: CacheKey,
    version: u64,
}

#[derive(Debug)]
pub struct VersionedCache<V> {
    versions: HashMap<CacheKey, u64>,
    entries: HashMap<CacheKey, (u64, V)>,
}

impl<V> Default for VersionedCache<V> {
    fn default() -> Self {
        Self {
            versions: HashMap::new(),
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone> VersionedCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, key: CacheKey) -> u64 {
        self.versions.get(&key).copied().unwrap_or(0)
    }

    pub fn invalidate(&mut self, keys: impl IntoIterator<Item = CacheKey>) {
        for key in keys {
            let version = self.versions.entry(key).or_insert(0);
            *version += 1;
            debug!(?key, version = *version, "cache key invalidated");
        }
    }

    pub fn apply(&mut self, mutation: Mutation) {
        self.invalidate(mutation.affected_keys());
    }

    /// The cached value, only if it is still current.
    pub fn get(&self, key: CacheKey) -> Option<&V> {
        let current = self.version(key);
        match self.entries.get(&key) {
            Some((version, value)) if *version == current => Some(value),
            _ => None,
        }
    }

    pub fn is_fresh(&self, key: CacheKey) -> bool {
        self.get(key).is_some()
    }

    pub fn begin_read(&self, key: CacheKey) -> ReadTicket {
        ReadTicket {
            key,
            version: self.version(key),
        }
    }

    /// Stores a fetched value under the ticket's token. If the key was
    /// invalidated while the fetch was in flight the entry is born stale.
    pub fn complete_read(&mut self, ticket: ReadTicket, value: V) {
        self.entries.insert(ticket.key, (ticket.version, value));
    }

    /// Stores a value the server just returned from a mutation.
    pub fn store_fresh(&mut self, key: CacheKey, value: V) {
        let version = self.version(key);
        self.entries.insert(key, (version, value));
    }

    pub async fn get_or_fetch<F, Fut, E>(&mut self, key: CacheKey, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value.clone());
        }
        let ticket = self.begin_read(key);
        let value = fetch().await?;
        self.complete_read(ticket, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn serves_cached_value_until_invalidated() {
        let mut cache: VersionedCache<u32> = VersionedCache::new();
        let key = CacheKey::ScanList;
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await
                .expect("fetch");
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.apply(Mutation::CreateScan);
        assert!(!cache.is_fresh(key));
        cache
            .get_or_fetch(key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(8)
            })
            .await
            .expect("refetch");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(key), Some(&8));
    }

    #[test]
    fn read_racing_a_mutation_is_born_stale() {
        let scan = ScanId::new();
        let key = CacheKey::ScanDetail(scan);
        let mut cache: VersionedCache<&str> = VersionedCache::new();

        let ticket = cache.begin_read(key);
        cache.apply(Mutation::ImagesChanged(scan));
        cache.complete_read(ticket, "before upload");

        assert!(cache.get(key).is_none());
    }

    #[test]
    fn mutations_only_touch_their_keys() {
        let scan = ScanId::new();
        let other = ScanId::new();
        let mut cache: VersionedCache<u8> = VersionedCache::new();
        cache.store_fresh(CacheKey::ScanDetail(other), 1);
        cache.store_fresh(CacheKey::Guide(scan), 2);

        cache.apply(Mutation::ImagesChanged(scan));

        assert_eq!(cache.get(CacheKey::ScanDetail(other)), Some(&1));
        assert_eq!(cache.get(CacheKey::Guide(scan)), Some(&2));
        assert_eq!(cache.version(CacheKey::ScanDetail(scan)), 1);
    }

    #[test]
    fn update_invalidates_detail_and_list() {
        let scan = ScanId::new();
        let keys = Mutation::UpdateScan(scan).affected_keys();
        assert!(keys.contains(&CacheKey::ScanDetail(scan)));
        assert!(keys.contains(&CacheKey::ScanList));
    }
}
