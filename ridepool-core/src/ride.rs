use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Ride status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Published,
    Filled,
    Cancelled,
    Completed,
}

impl RideStatus {
    /// Cancelled and completed rides have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Cancelled | RideStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Published => "PUBLISHED",
            RideStatus::Filled => "FILLED",
            RideStatus::Cancelled => "CANCELLED",
            RideStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for RideStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLISHED" => Ok(RideStatus::Published),
            "FILLED" => Ok(RideStatus::Filled),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            "COMPLETED" => Ok(RideStatus::Completed),
            other => Err(CoreError::Storage(format!("unknown ride status {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Opaque to the ledger; carried for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub model: String,
    pub number: String,
    pub image_url: Option<String>,
}

/// Everything a driver supplies when publishing.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRide {
    pub start_location: Location,
    pub end_location: Location,
    #[serde(default)]
    pub route: Vec<Coordinates>,
    pub departure_time: DateTime<Utc>,
    pub total_seats: i32,
    pub price_per_seat: i32,
    pub vehicle: Vehicle,
}

/// Driver edits that never touch capacity or status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideDetailsUpdate {
    pub start_location: Option<Location>,
    pub end_location: Option<Location>,
    pub route: Option<Vec<Coordinates>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub price_per_seat: Option<i32>,
    pub vehicle: Option<Vehicle>,
}

/// A published journey and its live seat counter.
///
/// `version` increases on every seat or status change and is what the
/// stores compare against when applying a conditional write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: String,
    pub start_location: Location,
    pub end_location: Location,
    pub route: Vec<Coordinates>,
    pub departure_time: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price_per_seat: i32,
    pub status: RideStatus,
    pub vehicle: Vehicle,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    /// Build a fresh `Published` ride with every seat available.
    pub fn publish(driver_id: &str, new_ride: NewRide, now: DateTime<Utc>) -> CoreResult<Self> {
        if new_ride.departure_time <= now {
            return Err(CoreError::ValidationError(
                "departure time must be in the future".to_string(),
            ));
        }
        if new_ride.total_seats < 1 {
            return Err(CoreError::ValidationError(
                "a ride needs at least one seat".to_string(),
            ));
        }
        if new_ride.price_per_seat <= 0 {
            return Err(CoreError::ValidationError(
                "price per seat must be positive".to_string(),
            ));
        }
        validate_location(&new_ride.start_location)?;
        validate_location(&new_ride.end_location)?;

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id: driver_id.to_string(),
            start_location: new_ride.start_location,
            end_location: new_ride.end_location,
            route: new_ride.route,
            departure_time: new_ride.departure_time,
            total_seats: new_ride.total_seats,
            available_seats: new_ride.total_seats,
            price_per_seat: new_ride.price_per_seat,
            status: RideStatus::Published,
            vehicle: new_ride.vehicle,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, driver_id: &str) -> bool {
        self.driver_id == driver_id
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departure_time <= now
    }

    /// Seats currently held by accepted bookings.
    pub fn consumed_seats(&self) -> i32 {
        self.total_seats - self.available_seats
    }

    pub fn route_label(&self) -> String {
        format!("{} → {}", self.start_location.name, self.end_location.name)
    }

    /// Published and not yet departed: the precondition for new bookings.
    pub fn ensure_open_for_booking(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != RideStatus::Published {
            return Err(CoreError::RideNotBookable(format!(
                "ride {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        if self.has_departed(now) {
            return Err(CoreError::RideNotBookable(format!(
                "ride {} has already departed",
                self.id
            )));
        }
        Ok(())
    }

    /// Take `seats` out of the counter. Flips to `Filled` when it reaches zero.
    pub fn reserve(&mut self, seats: i32, now: DateTime<Utc>) -> CoreResult<i32> {
        validate_seat_delta(seats)?;

        if self.status.is_terminal() {
            return Err(CoreError::RideNotBookable(format!(
                "ride {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        if self.has_departed(now) {
            return Err(CoreError::RideNotBookable(format!(
                "ride {} has already departed",
                self.id
            )));
        }
        if self.status == RideStatus::Filled || self.available_seats < seats {
            return Err(CoreError::InsufficientSeats {
                requested: seats,
                available: self.available_seats,
            });
        }

        self.available_seats -= seats;
        if self.available_seats == 0 {
            self.status = RideStatus::Filled;
        }
        self.bump(now);
        Ok(self.available_seats)
    }

    /// Put `seats` back. Overflowing `total_seats` is a ledger bug, not something to clamp.
    pub fn release(&mut self, seats: i32, now: DateTime<Utc>) -> CoreResult<i32> {
        validate_seat_delta(seats)?;

        if self.status.is_terminal() {
            return Err(CoreError::RideNotBookable(format!(
                "ride {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        let released = match self.available_seats.checked_add(seats) {
            Some(released) if released <= self.total_seats => released,
            _ => {
                return Err(CoreError::InvariantViolation(format!(
                    "releasing {} seats on ride {} would exceed capacity ({} of {} available)",
                    seats, self.id, self.available_seats, self.total_seats
                )))
            }
        };

        self.available_seats = released;
        if self.status == RideStatus::Filled && self.available_seats > 0 {
            self.status = RideStatus::Published;
        }
        self.bump(now);
        Ok(self.available_seats)
    }

    /// Change capacity while keeping every consumed seat consumed.
    pub fn resize(&mut self, new_total: i32, now: DateTime<Utc>) -> CoreResult<i32> {
        if self.status.is_terminal() {
            return Err(CoreError::RideNotBookable(format!(
                "ride {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        let consumed = self.consumed_seats();
        if new_total < 1 || new_total < consumed {
            return Err(CoreError::ValidationError(format!(
                "total seats must be at least {} ({} already booked)",
                consumed.max(1),
                consumed
            )));
        }

        self.total_seats = new_total;
        self.available_seats = new_total - consumed;
        self.status = if self.available_seats == 0 {
            RideStatus::Filled
        } else {
            RideStatus::Published
        };
        self.bump(now);
        Ok(self.available_seats)
    }

    /// Transition: Published|Filled → Cancelled. The seat counter is frozen as-is.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.finish(RideStatus::Cancelled, now)
    }

    /// Transition: Published|Filled → Completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.finish(RideStatus::Completed, now)
    }

    /// Apply a driver edit. Capacity, status and version are left alone.
    pub fn apply_details(&mut self, update: &RideDetailsUpdate, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "ride {} is {} and can no longer be edited",
                self.id,
                self.status.as_str()
            )));
        }
        if let Some(departure_time) = update.departure_time {
            if departure_time <= now {
                return Err(CoreError::ValidationError(
                    "departure time must be in the future".to_string(),
                ));
            }
        }
        if let Some(price) = update.price_per_seat {
            if price <= 0 {
                return Err(CoreError::ValidationError(
                    "price per seat must be positive".to_string(),
                ));
            }
        }
        if let Some(location) = &update.start_location {
            validate_location(location)?;
        }
        if let Some(location) = &update.end_location {
            validate_location(location)?;
        }

        if let Some(location) = &update.start_location {
            self.start_location = location.clone();
        }
        if let Some(location) = &update.end_location {
            self.end_location = location.clone();
        }
        if let Some(route) = &update.route {
            self.route = route.clone();
        }
        if let Some(departure_time) = update.departure_time {
            self.departure_time = departure_time;
        }
        if let Some(price) = update.price_per_seat {
            self.price_per_seat = price;
        }
        if let Some(vehicle) = &update.vehicle {
            self.vehicle = vehicle.clone();
        }
        self.updated_at = now;
        Ok(())
    }

    fn finish(&mut self, target: RideStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "ride {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = target;
        self.bump(now);
        Ok(())
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

fn validate_seat_delta(seats: i32) -> CoreResult<()> {
    if seats < 1 {
        return Err(CoreError::ValidationError(format!(
            "seat count must be at least 1, got {}",
            seats
        )));
    }
    Ok(())
}

fn validate_location(location: &Location) -> CoreResult<()> {
    if location.name.trim().is_empty() {
        return Err(CoreError::ValidationError("location name is required".to_string()));
    }
    let Coordinates { lat, lng } = location.coordinates;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(CoreError::ValidationError(format!(
            "coordinates out of range for {}",
            location.name
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_new_ride(total_seats: i32) -> NewRide {
        NewRide {
            start_location: Location {
                name: "Pune".to_string(),
                coordinates: Coordinates { lat: 18.52, lng: 73.85 },
            },
            end_location: Location {
                name: "Mumbai".to_string(),
                coordinates: Coordinates { lat: 19.07, lng: 72.87 },
            },
            route: vec![
                Coordinates { lat: 18.52, lng: 73.85 },
                Coordinates { lat: 19.07, lng: 72.87 },
            ],
            departure_time: Utc::now() + Duration::hours(6),
            total_seats,
            price_per_seat: 450,
            vehicle: Vehicle {
                model: "Swift".to_string(),
                number: "MH12AB1234".to_string(),
                image_url: None,
            },
        }
    }

    #[test]
    fn test_publish_rejects_past_departure() {
        let mut new_ride = sample_new_ride(3);
        new_ride.departure_time = Utc::now() - Duration::minutes(1);

        let result = Ride::publish("driver-1", new_ride, Utc::now());
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_reserve_until_filled_then_release() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(3), now).unwrap();

        assert_eq!(ride.reserve(2, now).unwrap(), 1);
        assert_eq!(ride.status, RideStatus::Published);

        assert_eq!(ride.reserve(1, now).unwrap(), 0);
        assert_eq!(ride.status, RideStatus::Filled);

        // Filled → Published once a seat comes back
        assert_eq!(ride.release(2, now).unwrap(), 2);
        assert_eq!(ride.status, RideStatus::Published);
        assert_eq!(ride.version, 3);
    }

    #[test]
    fn test_reserve_more_than_available() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(2), now).unwrap();

        let result = ride.reserve(3, now);
        assert!(matches!(
            result,
            Err(CoreError::InsufficientSeats { requested: 3, available: 2 })
        ));
        assert_eq!(ride.available_seats, 2);
        assert_eq!(ride.version, 0);
    }

    #[test]
    fn test_reserve_on_departed_ride() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(2), now).unwrap();

        let later = ride.departure_time + Duration::minutes(5);
        assert!(matches!(ride.reserve(1, later), Err(CoreError::RideNotBookable(_))));
    }

    #[test]
    fn test_release_overflow_is_an_invariant_violation() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(2), now).unwrap();

        assert!(matches!(ride.release(1, now), Err(CoreError::InvariantViolation(_))));
        assert!(matches!(ride.release(i32::MAX, now), Err(CoreError::InvariantViolation(_))));
        assert_eq!(ride.available_seats, 2);
        assert_eq!(ride.version, 0);
    }

    #[test]
    fn test_terminal_states() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(2), now).unwrap();
        ride.reserve(1, now).unwrap();
        ride.cancel(now).unwrap();

        assert!(matches!(ride.cancel(now), Err(CoreError::InvalidState(_))));
        assert!(matches!(ride.complete(now), Err(CoreError::InvalidState(_))));
        assert!(matches!(ride.reserve(1, now), Err(CoreError::RideNotBookable(_))));
        assert!(matches!(ride.release(1, now), Err(CoreError::RideNotBookable(_))));
        // Frozen at its last value
        assert_eq!(ride.available_seats, 1);
    }

    #[test]
    fn test_resize_keeps_consumed_seats() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(4), now).unwrap();
        ride.reserve(3, now).unwrap();

        assert!(matches!(ride.resize(2, now), Err(CoreError::ValidationError(_))));
        assert_eq!(ride.resize(3, now).unwrap(), 0);
        assert_eq!(ride.status, RideStatus::Filled);
        assert_eq!(ride.resize(5, now).unwrap(), 2);
        assert_eq!(ride.status, RideStatus::Published);
    }

    #[test]
    fn test_apply_details_leaves_inventory_alone() {
        let now = Utc::now();
        let mut ride = Ride::publish("driver-1", sample_new_ride(3), now).unwrap();
        ride.reserve(1, now).unwrap();

        let update = RideDetailsUpdate {
            price_per_seat: Some(500),
            ..Default::default()
        };
        ride.apply_details(&update, now).unwrap();

        assert_eq!(ride.price_per_seat, 500);
        assert_eq!(ride.available_seats, 2);
        assert_eq!(ride.version, 1);

        let bad = RideDetailsUpdate {
            price_per_seat: Some(0),
            ..Default::default()
        };
        assert!(ride.apply_details(&bad, now).is_err());
    }

    #[test]
    fn test_status_round_trips_through_storage_code() {
        for status in [
            RideStatus::Published,
            RideStatus::Filled,
            RideStatus::Cancelled,
            RideStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<RideStatus>().unwrap(), status);
        }
        assert!("BOARDING".parse::<RideStatus>().is_err());
    }
}
