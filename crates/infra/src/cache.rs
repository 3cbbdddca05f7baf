//! Cache-backed range reader.
//!
//! One slot per cache key, filled by a single remote read and kept until the
//! key is invalidated (no time-based expiry). Concurrent callers that miss on
//! the same key share one in-flight fetch. Every local invalidation is also
//! published on a broadcast channel so peer instances can drop their copy.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OnceCell, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sheetcrm_core::row::row_handle;

use crate::error::StoreError;
use crate::store::{RowRange, SheetStore};

/// Cache keys, one per table.
pub mod keys {
    pub const COMPANIES: &str = "companies";
    pub const CONTACTS: &str = "contacts";
    pub const RAW_LEADS: &str = "raw_leads";
    pub const OPPORTUNITIES: &str = "opportunities";
    pub const OPPORTUNITY_CONTACTS: &str = "opportunity_contacts";
    pub const INTERACTIONS: &str = "interactions";
    pub const EVENT_LOGS: &str = "event_logs";
    pub const SYSTEM_CONFIG: &str = "system_config";
}

const INVALIDATION_CAPACITY: usize = 256;

type Cached = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Cached>>;

/// An invalidation published by one cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub origin: Uuid,
    pub key: String,
}

pub struct RangeCache {
    instance: Uuid,
    store: Arc<dyn SheetStore>,
    slots: Mutex<HashMap<String, Slot>>,
    invalidations: broadcast::Sender<Invalidation>,
}

impl RangeCache {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        Self {
            instance: Uuid::now_v7(),
            store,
            slots: Mutex::new(HashMap::new()),
            invalidations,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    pub fn store(&self) -> &Arc<dyn SheetStore> {
        &self.store
    }

    fn slot(&self, key: &str) -> Result<Slot, StoreError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StoreError::Poisoned("range cache".to_string()))?;
        Ok(slots.entry(key.to_string()).or_default().clone())
    }

    /// Fetch `range` once per key and keep whatever `build` makes of its rows.
    ///
    /// A failed fetch leaves the slot empty, so the next caller retries.
    pub async fn get_or_fetch<V, B>(&self, key: &str, range: &RowRange, build: B) -> Result<Arc<V>, StoreError>
    where
        V: Send + Sync + 'static,
        B: FnOnce(Vec<Vec<String>>) -> V + Send,
    {
        let slot = self.slot(key)?;
        let cached = slot
            .get_or_try_init(|| async move {
                debug!(key, table = %range.table, "cache miss, reading range");
                let rows = self.store.read_range(range).await?;
                Ok::<Cached, StoreError>(Arc::new(build(rows)))
            })
            .await?;

        cached
            .clone()
            .downcast::<V>()
            .map_err(|_| StoreError::CacheType(key.to_string()))
    }

    /// Fetch, parse and sort a range.
    ///
    /// `parse` receives each row with its row handle and returns `None` for
    /// rows to skip (blank separator rows and the like). Handles stay
    /// positional, so skipping a row never shifts the handles of later rows.
    pub async fn fetch_and_cache<T, P, S>(
        &self,
        key: &str,
        range: &RowRange,
        parse: P,
        sort: S,
    ) -> Result<Arc<Vec<T>>, StoreError>
    where
        T: Send + Sync + 'static,
        P: Fn(&[String], u32) -> Option<T> + Send,
        S: FnMut(&T, &T) -> Ordering + Send,
    {
        self.get_or_fetch(key, range, move |rows| {
            let mut items: Vec<T> = rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| parse(row, row_handle(i)))
                .collect();
            items.sort_by(sort);
            items
        })
        .await
    }

    /// Drop `key` locally and tell peers to do the same.
    pub fn invalidate(&self, key: &str) {
        self.invalidate_local(key);
        // No subscribers is fine: single-instance deployments have no peers.
        let _ = self.invalidations.send(Invalidation {
            origin: self.instance,
            key: key.to_string(),
        });
    }

    /// Drop `key` without publishing.
    pub fn invalidate_local(&self, key: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            if slots.remove(key).is_some() {
                debug!(key, "cache invalidated");
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }
    }

    /// Whether `key` currently holds a fetched value.
    pub fn is_cached(&self, key: &str) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.get(key).is_some_and(|slot| slot.initialized()))
            .unwrap_or(false)
    }

    /// Invalidations published by this instance.
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }

    /// Apply a peer's invalidations to this cache until the peer goes away.
    ///
    /// Messages that originated here are ignored. If the receiver lags, the
    /// whole cache is dropped since some invalidations were lost.
    pub fn follow(self: &Arc<Self>, mut peer: broadcast::Receiver<Invalidation>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match peer.recv().await {
                    Ok(msg) if msg.origin == cache.instance => {}
                    Ok(msg) => cache.invalidate_local(&msg.key),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "invalidation feed lagged, clearing cache");
                        cache.clear();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("invalidation feed closed");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::{InMemorySheetStore, StoreOp};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn setup(latency_ms: u64) -> (Arc<InMemorySheetStore>, Arc<RangeCache>) {
        let store = Arc::new(InMemorySheetStore::new().with_latency(Duration::from_millis(latency_ms)));
        store.seed("T", vec![row(&["b"]), row(&["a"]), row(&["c"])]);
        let cache = Arc::new(RangeCache::new(store.clone()));
        (store, cache)
    }

    async fn letters(cache: &RangeCache) -> Result<Arc<Vec<(String, u32)>>, StoreError> {
        cache
            .fetch_and_cache(
                "letters",
                &RowRange::new("T", 'A'),
                |row, handle| Some((row[0].clone(), handle)),
                |a, b| a.0.cmp(&b.0),
            )
            .await
    }

    #[tokio::test]
    async fn parses_sorts_and_keeps_row_handles() {
        let (_, cache) = setup(0);
        let items = letters(&cache).await.unwrap();
        assert_eq!(
            *items,
            vec![("a".to_string(), 3), ("b".to_string(), 2), ("c".to_string(), 4)]
        );
    }

    #[tokio::test]
    async fn skipped_rows_keep_later_handles() {
        let (store, cache) = setup(0);
        store.seed("T", vec![row(&["a"]), row(&[""]), row(&["c"])]);
        let items = cache
            .fetch_and_cache(
                "nonblank",
                &RowRange::new("T", 'A'),
                |row, handle| {
                    let text = row.first().cloned().unwrap_or_default();
                    (!text.is_empty()).then_some((text, handle))
                },
                |a, b| a.0.cmp(&b.0),
            )
            .await
            .unwrap();
        assert_eq!(*items, vec![("a".to_string(), 2), ("c".to_string(), 4)]);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let (store, cache) = setup(20);
        let (a, b, c) = tokio::join!(letters(&cache), letters(&cache), letters(&cache));
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(store.read_count("T"), 1);

        letters(&cache).await.unwrap();
        assert_eq!(store.read_count("T"), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let (store, cache) = setup(0);
        letters(&cache).await.unwrap();
        cache.invalidate("letters");
        assert!(!cache.is_cached("letters"));
        letters(&cache).await.unwrap();
        assert_eq!(store.read_count("T"), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let (store, cache) = setup(0);
        store.fail_next(StoreOp::Read, "T");
        assert!(letters(&cache).await.is_err());
        assert!(!cache.is_cached("letters"));
        assert!(letters(&cache).await.is_ok());
    }

    #[tokio::test]
    async fn mismatched_types_are_reported() {
        let (_, cache) = setup(0);
        letters(&cache).await.unwrap();
        let err = cache
            .fetch_and_cache("letters", &RowRange::new("T", 'A'), |_, h| Some(h), |a, b| a.cmp(b))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::CacheType("letters".to_string()));
    }

    #[tokio::test]
    async fn peers_apply_each_others_invalidations() {
        let (store, local) = setup(0);
        let peer = Arc::new(RangeCache::new(store.clone()));
        let follower = peer.follow(local.subscribe());

        letters(&peer).await.unwrap();
        assert!(peer.is_cached("letters"));

        local.invalidate("letters");
        for _ in 0..50 {
            if !peer.is_cached("letters") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!peer.is_cached("letters"));
        follower.abort();
    }
}
