use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::driver::DriverProfile;
use crate::ride::Ride;
use crate::search::RideSearchQuery;

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for ride data access
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn insert_ride(&self, ride: &Ride) -> RepoResult<()>;

    async fn get_ride(&self, id: Uuid) -> RepoResult<Option<Ride>>;

    /// Conditional write of the inventory fields (`available_seats`,
    /// `total_seats`, `status`, `version`). Applies only if the stored
    /// version still equals `expected_version`; returns whether it applied.
    async fn swap_inventory(&self, ride: &Ride, expected_version: i64) -> RepoResult<bool>;

    /// Writes only the non-capacity fields of `ride` (locations, route,
    /// departure, price, vehicle). Seats, status and version are untouched.
    async fn update_details(&self, ride: &Ride) -> RepoResult<bool>;

    async fn search_published(
        &self,
        query: &RideSearchQuery,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Ride>>;

    async fn list_rides_for_driver(&self, driver_id: &str) -> RepoResult<Vec<Ride>>;
}

/// Repository trait for booking data access.
///
/// Mutations are conditional on the booking's current status so that a
/// driver decision and a passenger action racing on the same booking
/// resolve to exactly one winner.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// `false` when the passenger already holds a pending or accepted
    /// booking on the same ride; nothing is written then.
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<bool>;

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> RepoResult<Vec<Booking>>;

    async fn list_bookings_for_passenger(&self, passenger_id: &str) -> RepoResult<Vec<Booking>>;

    /// Set `to` only if the stored status and seat count still equal
    /// `current`'s. `None` when the guard failed.
    async fn transition_status(
        &self,
        current: &Booking,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>>;

    /// Change the seat count under the same guard as `transition_status`.
    async fn update_seats(
        &self,
        current: &Booking,
        to_seats: i32,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>>;
}

/// Repository trait for driver applications
#[async_trait]
pub trait DriverRepository: Send + Sync {
    async fn get_driver(&self, user_id: &str) -> RepoResult<Option<DriverProfile>>;

    async fn save_driver(&self, profile: &DriverProfile) -> RepoResult<()>;

    async fn list_pending_drivers(&self) -> RepoResult<Vec<DriverProfile>>;
}
