use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Milliseconds per night for pricing.
pub const MS_PER_DAY: Ms = 86_400_000;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as Ms
}

/// Half-open stay range `[start, end)`. Checkout day may equal another
/// booking's check-in day without conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Ms,
    pub end: Ms,
}

impl DateRange {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "DateRange start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Two half-open ranges `[a,b)` and `[c,d)` overlap iff `a < d && c < b`.
    /// Touching endpoints (`b == c`) are NOT an overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Number of billable nights: partial nights round up.
    pub fn nights(&self) -> i64 {
        (self.duration_ms() + MS_PER_DAY - 1) / MS_PER_DAY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Pending,
}

/// The persisted authoritative state — owned by the store, read-only input
/// for tree construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Ulid,
    pub unit_id: Ulid,
    pub guest_id: Ulid,
    pub range: DateRange,
    pub guests: u32,
    pub total_price: i64,
    pub status: BookingStatus,
    pub created_at: Ms,
}

impl BookingRecord {
    /// Confirmed and not yet ended at `now` — the only records the
    /// availability tree is built from.
    pub fn is_active(&self, now: Ms) -> bool {
        self.status == BookingStatus::Confirmed && self.range.end >= now
    }
}

/// A rentable unit. Rate is in minor currency units per night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: Ulid,
    pub name: Option<String>,
    pub nightly_rate: i64,
}

// ── Result types ─────────────────────────────────────────────────
// The surrounding HTTP layer maps these 1:1 onto response bodies.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub booking_id: Ulid,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub conflict: Option<ConflictInfo>,
}

impl Availability {
    pub fn open() -> Self {
        Self { available: true, conflict: None }
    }

    pub fn blocked(conflict: ConflictInfo) -> Self {
        Self { available: false, conflict: Some(conflict) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub nights: i64,
    pub nightly_rate: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub booking: BookingRecord,
    pub price: PriceBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_basics() {
        let r = DateRange::new(100, 200);
        assert_eq!(r.duration_ms(), 100);
    }

    #[test]
    fn range_overlap() {
        let a = DateRange::new(100, 200);
        let b = DateRange::new(150, 250);
        let c = DateRange::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // touching, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn nights_round_up() {
        assert_eq!(DateRange::new(0, MS_PER_DAY).nights(), 1);
        assert_eq!(DateRange::new(0, 5 * MS_PER_DAY).nights(), 5);
        // Any partial night bills as a full one
        assert_eq!(DateRange::new(0, MS_PER_DAY + 1).nights(), 2);
        assert_eq!(DateRange::new(0, 1).nights(), 1);
    }

    #[test]
    fn active_filter() {
        let mut record = BookingRecord {
            id: Ulid::new(),
            unit_id: Ulid::new(),
            guest_id: Ulid::new(),
            range: DateRange::new(1000, 2000),
            guests: 2,
            total_price: 9000,
            status: BookingStatus::Confirmed,
            created_at: 0,
        };
        assert!(record.is_active(500));
        assert!(record.is_active(2000)); // end >= now keeps it
        assert!(!record.is_active(2001));
        record.status = BookingStatus::Cancelled;
        assert!(!record.is_active(500));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn record_serialization_roundtrip() {
        let record = BookingRecord {
            id: Ulid::new(),
            unit_id: Ulid::new(),
            guest_id: Ulid::new(),
            range: DateRange::new(100, 200),
            guests: 1,
            total_price: 4200,
            status: BookingStatus::Pending,
            created_at: 50,
        };
        let json = serde_json::to_string(&record).unwrap();
        let decoded: BookingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, decoded);
    }
}
