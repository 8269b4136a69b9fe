use crate::types::ParsedSpec;
use dashmap::DashMap;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifetime of a cached spec when the caller does not give one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CacheEntry {
    spec: Arc<ParsedSpec>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// TTL-keyed store of normalized specs.
///
/// An expired entry is removed the first time it is looked up; there is no background
/// eviction or refresh.
pub struct SpecCache<K = String> {
    entries: DashMap<K, CacheEntry>,
    default_ttl: Duration,
}

impl<K> Debug for SpecCache<K>
where
    K: Hash + Eq + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecCache")
            .field("entries", &self.entries)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<K> Default for SpecCache<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> SpecCache<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        SpecCache {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// The cached spec, unless missing or expired. Expired entries are dropped.
    pub fn get(&self, key: &K) -> Option<Arc<ParsedSpec>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(Arc::clone(&entry.spec)),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            log::debug!("Dropped expired spec cache entry");
        }
        None
    }

    /// Stores `spec` under `key`, replacing any previous entry.
    pub fn set(&self, key: K, spec: Arc<ParsedSpec>, ttl: Option<Duration>) {
        let entry = CacheEntry {
            spec,
            stored_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        self.entries.insert(key, entry);
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether the entry under `key` was stored more than `max_age` ago. A missing entry is
    /// not stale.
    pub fn is_stale(&self, key: &K, max_age: Duration) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.stored_at.elapsed() > max_age)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        log::debug!("Cleared spec cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpecInfo;
    use crate::types::version::SpecVersion;
    use chrono::Utc;
    use indexmap::IndexMap;

    fn spec(source: &str) -> Arc<ParsedSpec> {
        Arc::new(ParsedSpec {
            spec_version: SpecVersion::V30x,
            info: SpecInfo::default(),
            servers: Vec::new(),
            tags: Vec::new(),
            endpoints: IndexMap::new(),
            schemas: IndexMap::new(),
            security_schemes: Vec::new(),
            security: Vec::new(),
            loaded_at: Utc::now(),
            source: source.to_string(),
        })
    }

    #[test]
    fn test_cache_get_set() {
        let cache = SpecCache::new();
        assert!(cache.get(&"current".to_string()).is_none());
        let stored = spec("a.json");
        cache.set("current".to_string(), Arc::clone(&stored), None);
        assert_eq!(cache.len(), 1);
        let cached = cache.get(&"current".to_string()).unwrap();
        assert!(Arc::ptr_eq(&stored, &cached));
    }

    #[test]
    fn test_cache_set_replaces_entry() {
        let cache = SpecCache::new();
        cache.set("current".to_string(), spec("a.json"), None);
        cache.set("current".to_string(), spec("b.json"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"current".to_string()).unwrap().source, "b.json");
    }

    #[test]
    fn test_expired_entry_is_removed_on_get() {
        let cache = SpecCache::new();
        cache.set("current".to_string(), spec("a.json"), Some(Duration::ZERO));
        assert!(cache.contains(&"current".to_string()));
        assert!(cache.get(&"current".to_string()).is_none());
        assert!(!cache.contains(&"current".to_string()));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = SpecCache::new();
        cache.set("a".to_string(), spec("a.json"), None);
        cache.set("b".to_string(), spec("b.json"), None);
        assert!(cache.invalidate(&"a".to_string()));
        assert!(!cache.invalidate(&"a".to_string()));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_is_stale() {
        let cache = SpecCache::new();
        assert!(!cache.is_stale(&"current".to_string(), Duration::ZERO));
        cache.set("current".to_string(), spec("a.json"), None);
        assert!(!cache.is_stale(&"current".to_string(), Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.is_stale(&"current".to_string(), Duration::from_millis(1)));
    }

    #[test]
    fn test_default_ttl_from_constructor() {
        let cache: SpecCache = SpecCache::with_default_ttl(Duration::from_secs(5));
        assert_eq!(cache.default_ttl(), Duration::from_secs(5));
        assert_eq!(SpecCache::<String>::new().default_ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_debug_lists_keys() {
        let cache = SpecCache::new();
        cache.set("current".to_string(), spec("a.json"), None);
        let rendered = format!("{:?}", cache);
        assert!(rendered.starts_with("SpecCache"));
        assert!(rendered.contains("\"current\""));
    }
}
