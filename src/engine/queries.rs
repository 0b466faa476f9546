use ulid::Ulid;

use crate::model::{Availability, BookingRecord, ConflictInfo, DateRange, Ms};
use crate::observability;

use super::{degraded, AvailabilityEngine, EngineError};

impl AvailabilityEngine {
    /// Fast, usually-correct "is this range free" answer for UI purposes.
    ///
    /// No side effects on persisted state; the only cache mutation is the
    /// normal fill-on-miss. A conflict comes back as a structured result,
    /// never an error. An unknown unit simply has no bookings.
    pub async fn check_availability(
        &self,
        unit_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Availability, EngineError> {
        if end <= start {
            return Err(EngineError::InvalidRange);
        }
        let query = DateRange::new(start, end);
        metrics::counter!(observability::AVAILABILITY_CHECKS_TOTAL).increment(1);

        let tree = self.cache().get(unit_id).await.map_err(degraded)?;
        match tree.find_overlap(&query) {
            Some(hit) => {
                metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
                Ok(Availability::blocked(ConflictInfo {
                    booking_id: hit.booking_id,
                    range: hit.range,
                }))
            }
            None => Ok(Availability::open()),
        }
    }

    /// Confirmed, not-yet-ended bookings for a unit, sorted by start.
    pub async fn list_bookings(&self, unit_id: Ulid) -> Result<Vec<BookingRecord>, EngineError> {
        self.with_deadline(self.reader().list_confirmed_active(unit_id))
            .await
            .map_err(degraded)
    }
}
