use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{now_ms, BookingRecord, BookingStatus, DateRange, UnitRecord};

/// Failures from the persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    /// The writer's per-unit exclusion constraint rejected an overlapping
    /// confirmed range. Optional capability — see `BookingWriter::insert`.
    RangeExclusion { booking_id: Ulid, range: DateRange },
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::RangeExclusion { booking_id, range } => write!(
                f,
                "range exclusion: overlaps booking {booking_id} [{}, {})",
                range.start, range.end
            ),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ── Collaborator contracts ───────────────────────────────────────

#[async_trait]
pub trait BookingReader: Send + Sync {
    /// Records with status confirmed and `range.end >= now`, sorted by start.
    async fn list_confirmed_active(&self, unit_id: Ulid) -> Result<Vec<BookingRecord>, StoreError>;

    /// Authoritative overlap query — same half-open rule as the tree, straight
    /// against persisted state, bypassing any cache.
    async fn find_overlapping(
        &self,
        unit_id: Ulid,
        range: DateRange,
    ) -> Result<Option<BookingRecord>, StoreError>;

    async fn get(&self, booking_id: Ulid) -> Result<Option<BookingRecord>, StoreError>;
}

#[async_trait]
pub trait BookingWriter: Send + Sync {
    /// Persist a new record. Implementations MAY enforce an exclusion
    /// constraint over overlapping confirmed ranges per unit and signal it
    /// with `StoreError::RangeExclusion`; the engine's commit protocol is
    /// only race-free up to this capability.
    async fn insert(&self, record: BookingRecord) -> Result<BookingRecord, StoreError>;

    async fn update_status(
        &self,
        booking_id: Ulid,
        status: BookingStatus,
    ) -> Result<BookingRecord, StoreError>;
}

#[async_trait]
pub trait UnitReader: Send + Sync {
    async fn nightly_rate(&self, unit_id: Ulid) -> Result<Option<i64>, StoreError>;
    async fn exists(&self, unit_id: Ulid) -> Result<bool, StoreError>;
}

// ── In-memory implementation ─────────────────────────────────────

pub type SharedUnitState = Arc<RwLock<UnitState>>;

/// One unit's persisted rows. Bookings stay sorted by `range.start` so the
/// overlap scan can cut off with a partition point.
#[derive(Debug, Clone)]
pub struct UnitState {
    pub unit: UnitRecord,
    bookings: Vec<BookingRecord>,
}

impl UnitState {
    fn new(unit: UnitRecord) -> Self {
        Self { unit, bookings: Vec::new() }
    }

    fn insert_sorted(&mut self, record: BookingRecord) {
        let pos = self
            .bookings
            .binary_search_by_key(&record.range.start, |b| b.range.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, record);
    }

    /// Records whose range overlaps the query window, any status.
    fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &BookingRecord> {
        // Everything at index >= bound starts at or after query.end → can't overlap.
        let bound = self.bookings.partition_point(|b| b.range.start < query.end);
        self.bookings[..bound]
            .iter()
            .filter(move |b| b.range.end > query.start)
    }

    fn find_mut(&mut self, booking_id: Ulid) -> Option<&mut BookingRecord> {
        self.bookings.iter_mut().find(|b| b.id == booking_id)
    }
}

/// DashMap-backed store: per-unit state behind its own lock, so writes to
/// different units never contend. Serves as the test double and as the
/// reference for what a real persistence adapter must guarantee.
pub struct InMemoryStore {
    units: DashMap<Ulid, SharedUnitState>,
    /// Reverse lookup: booking id → unit id.
    booking_to_unit: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            units: DashMap::new(),
            booking_to_unit: DashMap::new(),
        }
    }

    pub fn add_unit(&self, unit: UnitRecord) {
        self.units
            .insert(unit.id, Arc::new(RwLock::new(UnitState::new(unit))));
    }

    fn unit_state(&self, unit_id: &Ulid) -> Option<SharedUnitState> {
        self.units.get(unit_id).map(|e| e.value().clone())
    }
}

#[async_trait]
impl BookingReader for InMemoryStore {
    async fn list_confirmed_active(&self, unit_id: Ulid) -> Result<Vec<BookingRecord>, StoreError> {
        let Some(state) = self.unit_state(&unit_id) else {
            return Ok(Vec::new());
        };
        let guard = state.read().await;
        let now = now_ms();
        Ok(guard
            .bookings
            .iter()
            .filter(|b| b.is_active(now))
            .cloned()
            .collect())
    }

    async fn find_overlapping(
        &self,
        unit_id: Ulid,
        range: DateRange,
    ) -> Result<Option<BookingRecord>, StoreError> {
        let Some(state) = self.unit_state(&unit_id) else {
            return Ok(None);
        };
        let guard = state.read().await;
        Ok(guard
            .overlapping(&range)
            .find(|b| b.status == BookingStatus::Confirmed)
            .cloned())
    }

    async fn get(&self, booking_id: Ulid) -> Result<Option<BookingRecord>, StoreError> {
        let Some(unit_id) = self.booking_to_unit.get(&booking_id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(state) = self.unit_state(&unit_id) else {
            return Ok(None);
        };
        let guard = state.read().await;
        Ok(guard.bookings.iter().find(|b| b.id == booking_id).cloned())
    }
}

#[async_trait]
impl BookingWriter for InMemoryStore {
    async fn insert(&self, record: BookingRecord) -> Result<BookingRecord, StoreError> {
        let state = self
            .unit_state(&record.unit_id)
            .ok_or(StoreError::NotFound(record.unit_id))?;
        let mut guard = state.write().await;
        // Exclusion constraint: check and insert under the same write lock.
        if record.status == BookingStatus::Confirmed
            && let Some(existing) = guard
                .overlapping(&record.range)
                .find(|b| b.status == BookingStatus::Confirmed)
        {
            return Err(StoreError::RangeExclusion {
                booking_id: existing.id,
                range: existing.range,
            });
        }
        guard.insert_sorted(record.clone());
        self.booking_to_unit.insert(record.id, record.unit_id);
        Ok(record)
    }

    async fn update_status(
        &self,
        booking_id: Ulid,
        status: BookingStatus,
    ) -> Result<BookingRecord, StoreError> {
        let unit_id = self
            .booking_to_unit
            .get(&booking_id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(booking_id))?;
        let state = self
            .unit_state(&unit_id)
            .ok_or(StoreError::NotFound(unit_id))?;
        let mut guard = state.write().await;
        let record = guard
            .find_mut(booking_id)
            .ok_or(StoreError::NotFound(booking_id))?;
        record.status = status;
        Ok(record.clone())
    }
}

#[async_trait]
impl UnitReader for InMemoryStore {
    async fn nightly_rate(&self, unit_id: Ulid) -> Result<Option<i64>, StoreError> {
        match self.unit_state(&unit_id) {
            Some(state) => Ok(Some(state.read().await.unit.nightly_rate)),
            None => Ok(None),
        }
    }

    async fn exists(&self, unit_id: Ulid) -> Result<bool, StoreError> {
        Ok(self.units.contains_key(&unit_id))
    }
}
