use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entry mapping a credential to its exchanged access token.
#[derive(Clone)]
struct CacheEntry {
    token: String,
    expires_at: Instant,
}

/// Concurrent TTL cache of credential -> access token.
///
/// Expiry is checked at lookup time and stale entries are evicted lazily; a
/// periodic sweep can be triggered with `evict_expired()`. Cloning is cheap
/// and shares the underlying map, so the forwarder's invalidation is visible
/// to every subsequent broker lookup.
#[derive(Clone, Default)]
pub struct TokenCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, credential: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(credential) {
            if Instant::now() < entry.expires_at {
                return Some(entry.token.clone());
            }
            // expired — drop the ref before removing
            drop(entry);
            self.entries.remove(credential);
        }
        None
    }

    pub fn insert(&self, credential: &str, token: String, ttl: Duration) {
        self.entries.insert(
            credential.to_string(),
            CacheEntry {
                token,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, credential: &str) {
        self.entries.remove(credential);
    }

    /// Remove all expired entries. Call periodically from a background task
    /// to bound memory usage when many credentials pass through.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache = TokenCache::new();
        cache.insert("ghu_abc", "tid=xyz".into(), Duration::from_secs(60));
        assert_eq!(cache.get("ghu_abc").as_deref(), Some("tid=xyz"));
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = TokenCache::new();
        cache.insert("ghu_abc", "tid=xyz".into(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("ghu_abc"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = TokenCache::new();
        cache.insert("ghu_abc", "tid=xyz".into(), Duration::from_secs(60));
        cache.invalidate("ghu_abc");
        assert_eq!(cache.get("ghu_abc"), None);
    }

    #[test]
    fn shared_view_sees_invalidation() {
        let cache = TokenCache::new();
        let other = cache.clone();
        cache.insert("ghu_abc", "tid=xyz".into(), Duration::from_secs(60));
        other.invalidate("ghu_abc");
        assert_eq!(cache.get("ghu_abc"), None);
    }

    #[test]
    fn evict_expired_sweeps_only_stale_entries() {
        let cache = TokenCache::new();
        cache.insert("fresh", "a".into(), Duration::from_secs(60));
        cache.insert("stale", "b".into(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
