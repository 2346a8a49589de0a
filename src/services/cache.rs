//! Result Cache
//!
//! In-process cache of completed research payloads keyed by a fingerprint of
//! (query, mode). Entries are immutable once stored and expire by mode-specific
//! TTL; a background sweep removes expired entries every five minutes. The
//! cache is a hint, not a lock: concurrent identical requests may each do the
//! work, last writer wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::models::{ResearchMode, ResearchPayload};

/// Background sweep period
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Hex characters kept from the digest; enough to make collisions unrealistic.
const FINGERPRINT_LEN: usize = 16;

struct CacheEntry {
    payload: ResearchPayload,
    expires_at: Instant,
}

/// Process-local TTL cache for completed research results.
#[derive(Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

/// Short collision-resistant fingerprint of (query, mode).
pub fn fingerprint(query: &str, mode: ResearchMode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b"::");
    hasher.update(mode.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a non-expired entry; expired entries are removed on read.
    pub fn get(&self, query: &str, mode: ResearchMode) -> Option<ResearchPayload> {
        let key = fingerprint(query, mode);
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a completed payload under the mode's TTL.
    pub fn insert(&self, query: &str, mode: ResearchMode, payload: ResearchPayload) {
        self.insert_with_ttl(query, mode, payload, mode.cache_ttl());
    }

    pub fn insert_with_ttl(
        &self,
        query: &str,
        mode: ResearchMode,
        payload: ResearchPayload,
        ttl: Duration,
    ) {
        let key = fingerprint(query, mode);
        let entry = CacheEntry {
            payload,
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, entry);
    }

    /// Remove all expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodic sweep task; stops when `shutdown` fires.
pub fn spawn_sweeper(
    cache: Arc<ResultCache>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, "cache sweep removed expired entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenUsage;

    fn payload(report: &str) -> ResearchPayload {
        ResearchPayload {
            session_id: "s".into(),
            mode: ResearchMode::Quick,
            report: report.into(),
            citations: vec![],
            tokens: TokenUsage::default(),
            latency_ms: 1,
            from_cache: None,
        }
    }

    #[test]
    fn test_fingerprint_distinguishes_mode_and_query() {
        let a = fingerprint("What is HTTP?", ResearchMode::Quick);
        let b = fingerprint("What is HTTP?", ResearchMode::Deep);
        let c = fingerprint("What is TCP?", ResearchMode::Quick);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_eq!(a, fingerprint("What is HTTP?", ResearchMode::Quick));
    }

    #[test]
    fn test_get_after_insert() {
        let cache = ResultCache::new();
        cache.insert("q", ResearchMode::Quick, payload("result"));
        let hit = cache.get("q", ResearchMode::Quick).unwrap();
        assert_eq!(hit.report, "result");
        assert!(cache.get("q", ResearchMode::Deep).is_none());
    }

    #[test]
    fn test_expired_entry_misses_and_is_removed() {
        let cache = ResultCache::new();
        cache.insert_with_ttl("q", ResearchMode::Quick, payload("r"), Duration::ZERO);
        assert!(cache.get("q", ResearchMode::Quick).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ResultCache::new();
        cache.insert("q", ResearchMode::Quick, payload("first"));
        cache.insert("q", ResearchMode::Quick, payload("second"));
        assert_eq!(cache.get("q", ResearchMode::Quick).unwrap().report, "second");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = ResultCache::new();
        cache.insert_with_ttl("old", ResearchMode::Quick, payload("r"), Duration::ZERO);
        cache.insert("fresh", ResearchMode::Quick, payload("r"));
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh", ResearchMode::Quick).is_some());
    }
}
