mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ulid::Ulid;

use crate::cache::TreeCache;
use crate::config::EngineConfig;
use crate::store::{BookingReader, BookingWriter, StoreError, UnitReader};

/// The availability service: fast overlap checks against a cached interval
/// tree, and a check → authoritative re-check → commit protocol that cannot
/// confirm two overlapping bookings for the same unit (up to the writer's
/// exclusion guarantees).
///
/// Owns the cache and the collaborator handles. Constructed once per process
/// and shared by reference across request handlers; all concurrency comes
/// from callers invoking it concurrently.
pub struct AvailabilityEngine {
    cache: TreeCache,
    reader: Arc<dyn BookingReader>,
    writer: Arc<dyn BookingWriter>,
    units: Arc<dyn UnitReader>,
    persistence_timeout: Duration,
}

impl AvailabilityEngine {
    pub fn new(
        reader: Arc<dyn BookingReader>,
        writer: Arc<dyn BookingWriter>,
        units: Arc<dyn UnitReader>,
        config: EngineConfig,
    ) -> Self {
        let cache = TreeCache::new(
            reader.clone(),
            config.cache_ttl,
            config.persistence_timeout,
        );
        Self {
            cache,
            reader,
            writer,
            units,
            persistence_timeout: config.persistence_timeout,
        }
    }

    /// Administrative hook: drop the unit's cached tree after an out-of-band
    /// booking mutation.
    pub async fn invalidate(&self, unit_id: Ulid) {
        self.cache.invalidate(unit_id).await;
    }

    pub(super) fn cache(&self) -> &TreeCache {
        &self.cache
    }

    pub(super) fn reader(&self) -> &dyn BookingReader {
        self.reader.as_ref()
    }

    pub(super) fn writer(&self) -> &dyn BookingWriter {
        self.writer.as_ref()
    }

    pub(super) fn units(&self) -> &dyn UnitReader {
        self.units.as_ref()
    }

    /// Run a persistence call under the configured deadline.
    pub(super) async fn with_deadline<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.persistence_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable("persistence call timed out".into())),
        }
    }
}

/// Any store failure on a read or commit path degrades to fail-closed
/// `PersistenceUnavailable` — never "assume available".
pub(super) fn degraded(e: StoreError) -> EngineError {
    EngineError::PersistenceUnavailable(e.to_string())
}
