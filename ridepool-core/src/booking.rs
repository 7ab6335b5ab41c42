use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::ride::Ride;
use crate::{CoreError, CoreResult};

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

/// Something an actor (or a ride-level cascade) does to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Accept,
    Reject,
    Cancel,
    Complete,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed
        )
    }

    /// Pending or accepted: the booking still has a say in the ride.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Only accepted bookings have seats taken out of the ride's counter.
    pub fn holds_seats(&self) -> bool {
        *self == BookingStatus::Accepted
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    /// The transition table. Ledger side effects are the caller's business.
    pub fn apply(self, action: BookingAction) -> CoreResult<BookingStatus> {
        use BookingAction::*;
        use BookingStatus::*;

        match (self, action) {
            (Pending, Accept) => Ok(Accepted),
            (Pending, Reject) => Ok(Rejected),
            (Pending, Cancel) => Ok(Cancelled),
            (Accepted, Cancel) => Ok(Cancelled),
            (Accepted, Complete) => Ok(Completed),
            (from, action) => Err(CoreError::InvalidState(format!(
                "cannot {:?} a booking that is {}",
                action,
                from.as_str()
            ))),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "ACCEPTED" => Ok(BookingStatus::Accepted),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(CoreError::Storage(format!("unknown booking status {}", other))),
        }
    }
}

/// A passenger's request to occupy seats on a ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: String,
    pub seats_requested: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A new `Pending` booking. Nothing is reserved until the driver accepts.
    pub fn request(ride: &Ride, passenger_id: &str, seats: i32, now: DateTime<Utc>) -> CoreResult<Self> {
        validate_seats(ride, seats)?;
        if ride.is_owned_by(passenger_id) {
            return Err(CoreError::ValidationError(
                "drivers cannot book their own ride".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            passenger_id: passenger_id.to_string(),
            seats_requested: seats,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, passenger_id: &str) -> bool {
        self.passenger_id == passenger_id
    }
}

/// Seats must be positive and fit the ride's capacity.
pub fn validate_seats(ride: &Ride, seats: i32) -> CoreResult<()> {
    if seats < 1 {
        return Err(CoreError::ValidationError(
            "at least one seat must be requested".to_string(),
        ));
    }
    if seats > ride.total_seats {
        return Err(CoreError::ValidationError(format!(
            "requested {} seats but the ride only has {}",
            seats, ride.total_seats
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ride::tests::sample_new_ride;

    #[test]
    fn test_transition_table() {
        use BookingAction::*;
        use BookingStatus::*;

        assert_eq!(Pending.apply(Accept).unwrap(), Accepted);
        assert_eq!(Pending.apply(Reject).unwrap(), Rejected);
        assert_eq!(Pending.apply(Cancel).unwrap(), Cancelled);
        assert_eq!(Accepted.apply(Cancel).unwrap(), Cancelled);
        assert_eq!(Accepted.apply(Complete).unwrap(), Completed);

        assert!(Accepted.apply(Accept).is_err());
        assert!(Accepted.apply(Reject).is_err());
        assert!(Pending.apply(Complete).is_err());
        for terminal in [Rejected, Cancelled, Completed] {
            for action in [Accept, Reject, Cancel, Complete] {
                assert!(matches!(terminal.apply(action), Err(CoreError::InvalidState(_))));
            }
        }
    }

    #[test]
    fn test_request_validates_seats() {
        let now = Utc::now();
        let ride = Ride::publish("driver-1", sample_new_ride(3), now).unwrap();

        assert!(matches!(
            Booking::request(&ride, "rider-1", 0, now),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            Booking::request(&ride, "rider-1", 4, now),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            Booking::request(&ride, "driver-1", 1, now),
            Err(CoreError::ValidationError(_))
        ));

        let booking = Booking::request(&ride, "rider-1", 2, now).unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.ride_id, ride.id);
    }
}
