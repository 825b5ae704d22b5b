//! Ephemeral, TTL-bounded cache of song metrics keyed by media id.
//!
//! The cache is an accelerator only: entries may vanish at any time and
//! durable storage stays the system of record.

use crate::song_store::{SongMetrics, SongStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait StatsCache: Send + Sync {
    /// Stores `value` under `key`; it becomes unreadable after `ttl`.
    async fn set(&self, key: &str, value: SongMetrics, ttl: Duration);

    /// Returns the entry if present and not expired.
    async fn get(&self, key: &str) -> Option<SongMetrics>;

    async fn remove(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: SongMetrics,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
    last_access: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache bounded by entry count.
///
/// When full, expired entries are pruned first, then the least recently
/// accessed entry is evicted.
pub struct InMemoryStatsCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
}

impl InMemoryStatsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn make_room(entries: &mut HashMap<String, CacheEntry>, capacity: usize, now: Instant) {
        if entries.len() < capacity {
            return;
        }
        entries.retain(|_, e| e.is_live(now));
        while entries.len() >= capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    debug!("Evicting stats cache entry for {}", key);
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl StatsCache for InMemoryStatsCache {
    async fn set(&self, key: &str, value: SongMetrics, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            Self::make_room(&mut entries, self.capacity, now);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now.checked_add(ttl),
                last_access: now,
            },
        );
    }

    async fn get(&self, key: &str) -> Option<SongMetrics> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.last_access = now;
                Some(entry.value)
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// Where a read-through lookup found its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsSource {
    Cache,
    Store,
}

impl StatsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsSource::Cache => "cache",
            StatsSource::Store => "store",
        }
    }
}

/// Looks a song's metrics up in the cache, falling back to the durable
/// store on a miss. Returns `None` if the song does not exist.
pub async fn read_through(
    cache: &dyn StatsCache,
    store: &dyn SongStore,
    media_id: &str,
) -> Result<Option<(SongMetrics, StatsSource)>> {
    if let Some(metrics) = cache.get(media_id).await {
        return Ok(Some((metrics, StatsSource::Cache)));
    }
    let song = store.get_song(media_id)?;
    Ok(song.map(|s| (s.metrics(), StatsSource::Store)))
}
