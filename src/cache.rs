use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{now_ms, Ms};
use crate::observability;
use crate::store::{BookingReader, StoreError};
use crate::tree::IntervalTree;

struct CachedTree {
    tree: Arc<IntervalTree>,
    expires_at: Ms,
}

#[derive(Default)]
struct Slot {
    built: Option<CachedTree>,
}

type SharedSlot = Arc<RwLock<Slot>>;

/// Per-unit availability tree cache with TTL staleness and explicit
/// invalidation.
///
/// One slot per unit, each behind its own lock; `get` and `invalidate` on the
/// same unit serialize on that lock, so an invalidate issued by a concurrent
/// write can never be swallowed by a rebuild that started before it. Distinct
/// units never contend. Callers get an `Arc` snapshot and must treat the tree
/// as read-only; only the rebuild path here constructs trees.
pub struct TreeCache {
    slots: DashMap<Ulid, SharedSlot>,
    reader: Arc<dyn BookingReader>,
    ttl: Duration,
    read_timeout: Duration,
}

impl TreeCache {
    pub fn new(reader: Arc<dyn BookingReader>, ttl: Duration, read_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            reader,
            ttl,
            read_timeout,
        }
    }

    fn slot(&self, unit_id: Ulid) -> SharedSlot {
        self.slots.entry(unit_id).or_default().clone()
    }

    /// Live entry → its tree. Otherwise read confirmed-active bookings from
    /// the store (bounded by the read deadline), rebuild, cache with
    /// `expires_at = now + ttl`, and return the fresh tree.
    pub async fn get(&self, unit_id: Ulid) -> Result<Arc<IntervalTree>, StoreError> {
        let slot = self.slot(unit_id);
        let mut guard = slot.write().await;

        let now = now_ms();
        if let Some(cached) = &guard.built
            && cached.expires_at > now
        {
            metrics::counter!(observability::CACHE_HITS_TOTAL).increment(1);
            return Ok(cached.tree.clone());
        }
        metrics::counter!(observability::CACHE_MISSES_TOTAL).increment(1);

        let records = tokio::time::timeout(
            self.read_timeout,
            self.reader.list_confirmed_active(unit_id),
        )
        .await
        .map_err(|_| StoreError::Unavailable("booking read timed out".into()))??;

        let build_start = Instant::now();
        let tree = Arc::new(IntervalTree::from_records(&records, now));
        metrics::histogram!(observability::TREE_BUILD_DURATION_SECONDS)
            .record(build_start.elapsed().as_secs_f64());
        metrics::histogram!(observability::TREE_SIZE).record(tree.len() as f64);
        tracing::debug!(unit = %unit_id, size = tree.len(), "rebuilt availability tree");

        guard.built = Some(CachedTree {
            tree: tree.clone(),
            expires_at: now + self.ttl.as_millis() as Ms,
        });
        Ok(tree)
    }

    /// Drop the unit's entry regardless of expiry. Every successful write
    /// affecting the unit must call this before its response is observable.
    pub async fn invalidate(&self, unit_id: Ulid) {
        let Some(slot) = self.slots.get(&unit_id).map(|e| e.value().clone()) else {
            return;
        };
        let mut guard = slot.write().await;
        if guard.built.take().is_some() {
            metrics::counter!(observability::CACHE_INVALIDATIONS_TOTAL).increment(1);
            tracing::debug!(unit = %unit_id, "invalidated availability tree");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingRecord, BookingStatus, DateRange};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reader stub that counts how many times the cache rebuilt from it.
    struct CountingReader {
        records: std::sync::RwLock<Vec<BookingRecord>>,
        reads: AtomicUsize,
        delay: Duration,
    }

    impl CountingReader {
        fn new(records: Vec<BookingRecord>) -> Self {
            Self {
                records: std::sync::RwLock::new(records),
                reads: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn slow(delay: Duration) -> Self {
            let mut reader = Self::new(Vec::new());
            reader.delay = delay;
            reader
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BookingReader for CountingReader {
        async fn list_confirmed_active(
            &self,
            unit_id: Ulid,
        ) -> Result<Vec<BookingRecord>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self
                .records
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.unit_id == unit_id)
                .cloned()
                .collect())
        }

        async fn find_overlapping(
            &self,
            _unit_id: Ulid,
            _range: DateRange,
        ) -> Result<Option<BookingRecord>, StoreError> {
            Ok(None)
        }

        async fn get(&self, _booking_id: Ulid) -> Result<Option<BookingRecord>, StoreError> {
            Ok(None)
        }
    }

    fn future_record(unit_id: Ulid) -> BookingRecord {
        let start = now_ms() + 10 * crate::model::MS_PER_DAY;
        BookingRecord {
            id: Ulid::new(),
            unit_id,
            guest_id: Ulid::new(),
            range: DateRange::new(start, start + crate::model::MS_PER_DAY),
            guests: 1,
            total_price: 0,
            status: BookingStatus::Confirmed,
            created_at: 0,
        }
    }

    fn cache_with(reader: Arc<CountingReader>, ttl: Duration) -> TreeCache {
        TreeCache::new(reader, ttl, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn second_get_hits_cache() {
        let unit_id = Ulid::new();
        let reader = Arc::new(CountingReader::new(vec![future_record(unit_id)]));
        let cache = cache_with(reader.clone(), Duration::from_secs(60));

        let first = cache.get(unit_id).await.unwrap();
        let second = cache.get(unit_id).await.unwrap();
        assert_eq!(reader.reads(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild_before_ttl() {
        let unit_id = Ulid::new();
        let reader = Arc::new(CountingReader::new(vec![future_record(unit_id)]));
        let cache = cache_with(reader.clone(), Duration::from_secs(60));

        cache.get(unit_id).await.unwrap();
        cache.invalidate(unit_id).await;
        cache.get(unit_id).await.unwrap();
        assert_eq!(reader.reads(), 2);
    }

    #[tokio::test]
    async fn expired_entry_rebuilds() {
        let unit_id = Ulid::new();
        let reader = Arc::new(CountingReader::new(vec![future_record(unit_id)]));
        let cache = cache_with(reader.clone(), Duration::from_millis(20));

        cache.get(unit_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get(unit_id).await.unwrap();
        assert_eq!(reader.reads(), 2);
    }

    #[tokio::test]
    async fn units_do_not_share_entries() {
        let unit_a = Ulid::new();
        let unit_b = Ulid::new();
        let reader = Arc::new(CountingReader::new(vec![
            future_record(unit_a),
            future_record(unit_b),
        ]));
        let cache = cache_with(reader.clone(), Duration::from_secs(60));

        cache.get(unit_a).await.unwrap();
        cache.get(unit_b).await.unwrap();
        assert_eq!(reader.reads(), 2);

        // Invalidating A leaves B's entry live
        cache.invalidate(unit_a).await;
        cache.get(unit_b).await.unwrap();
        assert_eq!(reader.reads(), 2);
        cache.get(unit_a).await.unwrap();
        assert_eq!(reader.reads(), 3);
    }

    #[tokio::test]
    async fn invalidate_unknown_unit_is_noop() {
        let reader = Arc::new(CountingReader::new(Vec::new()));
        let cache = cache_with(reader, Duration::from_secs(60));
        cache.invalidate(Ulid::new()).await;
    }

    #[tokio::test]
    async fn slow_reader_times_out() {
        let reader = Arc::new(CountingReader::slow(Duration::from_secs(5)));
        let cache = TreeCache::new(reader, Duration::from_secs(60), Duration::from_millis(20));
        let result = cache.get(Ulid::new()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
