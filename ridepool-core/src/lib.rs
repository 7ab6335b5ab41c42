pub mod booking;
pub mod driver;
pub mod notify;
pub mod repository;
pub mod ride;
pub mod search;

pub use booking::{Booking, BookingAction, BookingStatus};
pub use driver::{DriverProfile, DriverStatus};
pub use ride::{Coordinates, Location, NewRide, Ride, RideDetailsUpdate, RideStatus, Vehicle};
pub use search::RideSearchQuery;

/// Every failure a core operation can hand back to the request layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },
    #[error("Ride not bookable: {0}")]
    RideNotBookable(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    /// The seat ledger detected a state that should be impossible.
    #[error("Seat ledger invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn storage(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Storage(err.to_string())
    }

    pub fn ride_not_found(id: uuid::Uuid) -> Self {
        CoreError::NotFound(format!("ride {}", id))
    }

    pub fn booking_not_found(id: uuid::Uuid) -> Self {
        CoreError::NotFound(format!("booking {}", id))
    }

    /// Short machine-readable code the frontend switches on.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::InvalidState(_) => "INVALID_STATE",
            CoreError::InsufficientSeats { .. } => "INSUFFICIENT_SEATS",
            CoreError::RideNotBookable(_) => "RIDE_NOT_BOOKABLE",
            CoreError::ValidationError(_) => "VALIDATION_ERROR",
            CoreError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
