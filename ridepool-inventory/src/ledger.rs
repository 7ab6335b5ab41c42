use chrono::{DateTime, Utc};
use ridepool_core::repository::RideRepository;
use ridepool_core::{CoreError, CoreResult, Ride, RideStatus};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 64;

/// Result of a successful seat movement.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub ride_id: Uuid,
    pub available_seats: i32,
    pub total_seats: i32,
    pub status: RideStatus,
}

impl From<&Ride> for LedgerOutcome {
    fn from(ride: &Ride) -> Self {
        Self {
            ride_id: ride.id,
            available_seats: ride.available_seats,
            total_seats: ride.total_seats,
            status: ride.status,
        }
    }
}

/// The single writer of `Ride.available_seats` and `Ride.status`.
///
/// Every operation is a read / mutate / conditional-write loop keyed on the
/// ride's version. A lost race re-reads and re-evaluates the preconditions,
/// so two reservations can never together overdraw the counter. Domain
/// failures (`InsufficientSeats`, `RideNotBookable`, ...) are returned on the
/// first evaluation that produces them and are never retried here.
pub struct SeatLedger {
    rides: Arc<dyn RideRepository>,
    max_attempts: u32,
}

impl SeatLedger {
    pub fn new(rides: Arc<dyn RideRepository>) -> Self {
        Self::with_max_attempts(rides, DEFAULT_MAX_CAS_ATTEMPTS)
    }

    pub fn with_max_attempts(rides: Arc<dyn RideRepository>, max_attempts: u32) -> Self {
        Self {
            rides,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Take `seats` out of the ride. Fills the ride when the counter hits zero.
    pub async fn reserve(&self, ride_id: Uuid, seats: i32) -> CoreResult<LedgerOutcome> {
        let ride = self
            .apply(ride_id, "reserve", |ride, now| ride.reserve(seats, now).map(|_| ()))
            .await?;
        info!(
            "Reserved {} seats on ride {}: {} left ({})",
            seats,
            ride_id,
            ride.available_seats,
            ride.status.as_str()
        );
        Ok(LedgerOutcome::from(&ride))
    }

    /// Give `seats` back. Reopens a filled ride.
    pub async fn release(&self, ride_id: Uuid, seats: i32) -> CoreResult<LedgerOutcome> {
        let ride = self
            .apply(ride_id, "release", |ride, now| ride.release(seats, now).map(|_| ()))
            .await
            .inspect_err(|e| {
                if let CoreError::InvariantViolation(msg) = e {
                    error!("Seat ledger invariant violated on ride {}: {}", ride_id, msg);
                }
            })?;
        info!(
            "Released {} seats on ride {}: {} left ({})",
            seats,
            ride_id,
            ride.available_seats,
            ride.status.as_str()
        );
        Ok(LedgerOutcome::from(&ride))
    }

    /// Reconciled capacity change: consumed seats stay consumed.
    pub async fn resize(&self, ride_id: Uuid, new_total: i32) -> CoreResult<LedgerOutcome> {
        let ride = self
            .apply(ride_id, "resize", |ride, now| ride.resize(new_total, now).map(|_| ()))
            .await?;
        info!(
            "Resized ride {} to {} seats: {} available",
            ride_id, ride.total_seats, ride.available_seats
        );
        Ok(LedgerOutcome::from(&ride))
    }

    /// Freeze the ride as cancelled. Seats are not released individually.
    pub async fn cancel_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        let ride = self.apply(ride_id, "cancel", |ride, now| ride.cancel(now)).await?;
        info!("Ride {} cancelled with {} seats frozen", ride_id, ride.available_seats);
        Ok(ride)
    }

    pub async fn complete_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        let ride = self.apply(ride_id, "complete", |ride, now| ride.complete(now)).await?;
        info!("Ride {} completed", ride_id);
        Ok(ride)
    }

    async fn apply<F>(&self, ride_id: Uuid, op: &str, mutate: F) -> CoreResult<Ride>
    where
        F: Fn(&mut Ride, DateTime<Utc>) -> CoreResult<()>,
    {
        for attempt in 1..=self.max_attempts {
            let mut ride = self
                .rides
                .get_ride(ride_id)
                .await
                .map_err(CoreError::storage)?
                .ok_or_else(|| CoreError::ride_not_found(ride_id))?;

            let expected_version = ride.version;
            mutate(&mut ride, Utc::now())?;

            let applied = self
                .rides
                .swap_inventory(&ride, expected_version)
                .await
                .map_err(CoreError::storage)?;
            if applied {
                return Ok(ride);
            }

            debug!(
                "Version conflict on ride {} during {} (attempt {}/{})",
                ride_id, op, attempt, self.max_attempts
            );
            tokio::task::yield_now().await;
        }

        error!(
            "Gave up {} on ride {} after {} conflicting attempts",
            op, ride_id, self.max_attempts
        );
        Err(CoreError::Storage(format!(
            "ride {} is under heavy contention, {} not applied",
            ride_id, op
        )))
    }
}
