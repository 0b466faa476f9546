use ulid::Ulid;

use crate::model::ConflictInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `end <= start`. Rejected before the cache or tree is touched.
    InvalidRange,
    UnitNotFound(Ulid),
    BookingNotFound(Ulid),
    /// The requested range overlaps an existing confirmed booking. A normal,
    /// expected outcome of `create_booking` — carries the blocker's identity
    /// so the caller can render useful feedback.
    Conflict(ConflictInfo),
    /// Cancel attempted by someone other than the booking's guest.
    Unauthorized(Ulid),
    AlreadyCancelled(Ulid),
    /// Persistence timeout or outage. The only class eligible for
    /// caller-directed retry; reads degrade to "cannot confirm available".
    PersistenceUnavailable(String),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PersistenceUnavailable(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange => write!(f, "end date must be after start date"),
            EngineError::UnitNotFound(id) => write!(f, "unit not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::Conflict(c) => write!(
                f,
                "dates overlap booking {} [{}, {})",
                c.booking_id, c.range.start, c.range.end
            ),
            EngineError::Unauthorized(id) => {
                write!(f, "only the booking's guest may cancel {id}")
            }
            EngineError::AlreadyCancelled(id) => write!(f, "booking already cancelled: {id}"),
            EngineError::PersistenceUnavailable(e) => {
                write!(f, "persistence unavailable: {e}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
