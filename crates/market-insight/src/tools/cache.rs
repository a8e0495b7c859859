//! TTL + LRU cache for `web_search` results, grounded in
//! `original_source/backend/tools/cache.py`.

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Value,
    expire_at: Instant,
    /// Monotonic touch counter; higher means more recently used.
    last_used: u64,
}

struct CacheInner {
    data: HashMap<String, CacheEntry>,
    clock: u64,
}

/// Bounded, TTL-expiring cache for tool results. Eviction is least-recently-used
/// once `max_size` is exceeded.
pub struct ToolCache {
    ttl: Duration,
    max_size: usize,
    inner: Mutex<CacheInner>,
}

impl ToolCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size,
            inner: Mutex::new(CacheInner { data: HashMap::new(), clock: 0 }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let hit = match inner.data.get(key) {
            Some(entry) if entry.expire_at > now => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };

        if hit.is_none() {
            inner.data.remove(key);
            return None;
        }

        inner.clock += 1;
        let clock = inner.clock;
        if let Some(entry) = inner.data.get_mut(key) {
            entry.last_used = clock;
        }
        hit
    }

    pub fn set(&self, key: String, value: Value) {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;
        let expire_at = Instant::now() + self.ttl;
        inner.data.insert(key, CacheEntry { value, expire_at, last_used: clock });

        if inner.data.len() > self.max_size {
            let evict_key = inner
                .data
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(evict_key) = evict_key {
                inner.data.remove(&evict_key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }
}

/// Deterministic cache key over the fields that make a `web_search` call
/// reusable across agents and debate rounds.
pub fn build_key(agent_name: &str, model: &str, template_version: &str, prompt_hash: &str, debate_round: u32, enable_websearch: bool) -> String {
    // serde_json's default Map is BTreeMap-backed, so this serializes with
    // sorted keys the same way the original's `json.dumps(..., sort_keys=True)` does.
    let payload = serde_json::json!({
        "agent_name": agent_name,
        "debate_round": debate_round,
        "enable_websearch": enable_websearch,
        "model": model,
        "prompt_hash": prompt_hash,
        "template_version": template_version,
    });
    let serialized = serde_json::to_string(&payload).expect("json map serialization cannot fail");
    hex_sha256(serialized.as_bytes())
}

/// Hashes a set of prompt fragments the same way the cache key's
/// `prompt_hash` input is produced upstream: joined by a blank line, then
/// SHA-256 hex-digested.
pub fn hash_prompt(parts: &[&str]) -> String {
    hex_sha256(parts.join("\n\n").as_bytes())
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_round_trips() {
        let cache = ToolCache::new(Duration::from_secs(60), 10);
        cache.set("k".to_string(), json!({"ok": true}));
        assert_eq!(cache.get("k"), Some(json!({"ok": true})));
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = ToolCache::new(Duration::from_millis(0), 10);
        cache.set("k".to_string(), json!("v"));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn lru_eviction_drops_least_recently_used() {
        let cache = ToolCache::new(Duration::from_secs(60), 2);
        cache.set("a".to_string(), json!(1));
        cache.set("b".to_string(), json!(2));
        // touch "a" so "b" becomes the least recently used entry
        cache.get("a");
        cache.set("c".to_string(), json!(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn build_key_is_order_independent_of_call_site_but_sensitive_to_fields() {
        let key_a = build_key("trend_scout", "insight-default", "v1", "hash1", 0, true);
        let key_b = build_key("trend_scout", "insight-default", "v1", "hash1", 1, true);
        assert_ne!(key_a, key_b);
        assert_eq!(key_a, build_key("trend_scout", "insight-default", "v1", "hash1", 0, true));
    }

    #[test]
    fn hash_prompt_is_deterministic() {
        assert_eq!(hash_prompt(&["a", "b"]), hash_prompt(&["a", "b"]));
        assert_ne!(hash_prompt(&["a", "b"]), hash_prompt(&["a", "c"]));
    }
}
