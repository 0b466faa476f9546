use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::{
    now_ms, BookingReceipt, BookingRecord, BookingStatus, ConflictInfo, DateRange, Ms,
    PriceBreakdown,
};
use crate::observability;
use crate::store::StoreError;

use super::{degraded, AvailabilityEngine, EngineError};

impl AvailabilityEngine {
    /// Two-phase commit protocol: fast check against the cached tree, then an
    /// authoritative re-check straight against persistence, then the write.
    /// The re-check catches bookings committed after the cached tree was
    /// built; a true write-write race inside the final round trip is settled
    /// by the writer's exclusion constraint, when it provides one.
    pub async fn create_booking(
        &self,
        unit_id: Ulid,
        start: Ms,
        end: Ms,
        guest_id: Ulid,
        guests: u32,
    ) -> Result<BookingReceipt, EngineError> {
        if end <= start {
            return Err(EngineError::InvalidRange);
        }
        let range = DateRange::new(start, end);

        let exists = self
            .with_deadline(self.units().exists(unit_id))
            .await
            .map_err(degraded)?;
        if !exists {
            return Err(EngineError::UnitNotFound(unit_id));
        }

        // Phase 1: fast check. On a hit, fail without attempting a write.
        let tree = self.cache().get(unit_id).await.map_err(degraded)?;
        if let Some(hit) = tree.find_overlap(&range) {
            metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
            debug!(unit = %unit_id, blocker = %hit.booking_id, "fast check found conflict");
            return Err(EngineError::Conflict(ConflictInfo {
                booking_id: hit.booking_id,
                range: hit.range,
            }));
        }
        drop(tree);

        // Phase 2: authoritative re-check, bypassing the cache. A hit here
        // means the cache missed a real booking — drop the stale entry.
        if let Some(existing) = self
            .with_deadline(self.reader().find_overlapping(unit_id, range))
            .await
            .map_err(degraded)?
        {
            metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
            warn!(unit = %unit_id, blocker = %existing.id, "re-check caught stale cache");
            self.cache().invalidate(unit_id).await;
            return Err(EngineError::Conflict(ConflictInfo {
                booking_id: existing.id,
                range: existing.range,
            }));
        }

        // Phase 3: price and commit.
        let nightly_rate = self
            .with_deadline(self.units().nightly_rate(unit_id))
            .await
            .map_err(degraded)?
            .ok_or(EngineError::UnitNotFound(unit_id))?;
        let nights = range.nights();
        let price = PriceBreakdown {
            nights,
            nightly_rate,
            total: nights * nightly_rate,
        };
        let record = BookingRecord {
            id: Ulid::new(),
            unit_id,
            guest_id,
            range,
            guests,
            total_price: price.total,
            status: BookingStatus::Confirmed,
            created_at: now_ms(),
        };

        let booking = match self.with_deadline(self.writer().insert(record)).await {
            Ok(booking) => booking,
            Err(StoreError::RangeExclusion { booking_id, range }) => {
                metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
                warn!(unit = %unit_id, blocker = %booking_id, "writer exclusion settled commit race");
                self.cache().invalidate(unit_id).await;
                return Err(EngineError::Conflict(ConflictInfo { booking_id, range }));
            }
            Err(StoreError::NotFound(id)) => return Err(EngineError::UnitNotFound(id)),
            // Aborted commit: nothing was written, so the cache is NOT
            // invalidated — no committed change occurred.
            Err(e) => return Err(degraded(e)),
        };

        // Invalidate before the response is observable, so the next read
        // rebuilds with this booking included.
        self.cache().invalidate(unit_id).await;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(unit = %unit_id, booking = %booking.id, nights, total = price.total, "booking confirmed");
        Ok(BookingReceipt { booking, price })
    }

    /// Cancel a booking: owner-only, already-cancelled is a rejected no-op.
    pub async fn cancel_booking(
        &self,
        booking_id: Ulid,
        requester_id: Ulid,
    ) -> Result<BookingRecord, EngineError> {
        let record = self
            .with_deadline(self.reader().get(booking_id))
            .await
            .map_err(degraded)?
            .ok_or(EngineError::BookingNotFound(booking_id))?;

        if record.guest_id != requester_id {
            return Err(EngineError::Unauthorized(booking_id));
        }
        if record.status == BookingStatus::Cancelled {
            return Err(EngineError::AlreadyCancelled(booking_id));
        }

        let updated = match self
            .with_deadline(self.writer().update_status(booking_id, BookingStatus::Cancelled))
            .await
        {
            Ok(record) => record,
            Err(StoreError::NotFound(id)) => return Err(EngineError::BookingNotFound(id)),
            Err(e) => return Err(degraded(e)),
        };

        self.cache().invalidate(updated.unit_id).await;
        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        info!(unit = %updated.unit_id, booking = %booking_id, "booking cancelled");
        Ok(updated)
    }
}
