use chrono::Utc;
use ridepool_core::repository::{BookingRepository, RideRepository};
use ridepool_core::{
    Booking, BookingAction, BookingStatus, CoreError, CoreResult, NewRide, Ride, RideDetailsUpdate,
    RideSearchQuery, RideStatus,
};
use ridepool_inventory::SeatLedger;
use ridepool_shared::NotificationKind;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::drivers::DriverService;
use crate::notifier::NotificationDispatcher;

/// Ride lifecycle: publish, edit, search, and the terminal transitions
/// that cascade onto bookings.
pub struct RideService {
    rides: Arc<dyn RideRepository>,
    bookings: Arc<dyn BookingRepository>,
    drivers: Arc<DriverService>,
    ledger: Arc<SeatLedger>,
    notifier: NotificationDispatcher,
}

impl RideService {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        bookings: Arc<dyn BookingRepository>,
        drivers: Arc<DriverService>,
        ledger: Arc<SeatLedger>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            rides,
            bookings,
            drivers,
            ledger,
            notifier,
        }
    }

    pub async fn create_ride(&self, driver_id: &str, new_ride: NewRide) -> CoreResult<Ride> {
        self.drivers.ensure_approved(driver_id).await?;

        let ride = Ride::publish(driver_id, new_ride, Utc::now())?;
        self.rides.insert_ride(&ride).await.map_err(CoreError::storage)?;

        info!(
            "Ride {} published by {}: {} with {} seats",
            ride.id,
            driver_id,
            ride.route_label(),
            ride.total_seats
        );
        Ok(ride)
    }

    pub async fn get_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        self.rides
            .get_ride(ride_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::ride_not_found(ride_id))
    }

    /// Edit locations, departure, price or vehicle. Capacity goes through `resize_ride`.
    pub async fn update_ride_fields(
        &self,
        ride_id: Uuid,
        driver_id: &str,
        update: RideDetailsUpdate,
    ) -> CoreResult<Ride> {
        let mut ride = self.owned_ride(ride_id, driver_id).await?;
        ride.apply_details(&update, Utc::now())?;

        let applied = self.rides.update_details(&ride).await.map_err(CoreError::storage)?;
        if !applied {
            return Err(CoreError::InvalidState(format!(
                "ride {} was closed while being edited",
                ride_id
            )));
        }

        info!("Ride {} details updated by {}", ride_id, driver_id);
        self.get_ride(ride_id).await
    }

    pub async fn resize_ride(&self, ride_id: Uuid, driver_id: &str, total_seats: i32) -> CoreResult<Ride> {
        self.owned_ride(ride_id, driver_id).await?;
        self.ledger.resize(ride_id, total_seats).await?;
        self.get_ride(ride_id).await
    }

    pub async fn search_published_rides(&self, query: &RideSearchQuery) -> CoreResult<Vec<Ride>> {
        query.validate()?;
        self.rides
            .search_published(query, Utc::now())
            .await
            .map_err(CoreError::storage)
    }

    pub async fn list_rides_for_driver(&self, driver_id: &str) -> CoreResult<Vec<Ride>> {
        self.rides
            .list_rides_for_driver(driver_id)
            .await
            .map_err(CoreError::storage)
    }

    /// Published|Filled → Cancelled, then every live booking → Cancelled.
    /// No seats are released: the ride's counter is frozen.
    pub async fn cancel_ride(&self, ride_id: Uuid, driver_id: &str) -> CoreResult<Ride> {
        self.owned_ride(ride_id, driver_id).await?;
        let ride = self.ledger.cancel_ride(ride_id).await?;

        let affected = self.cascade(&ride).await?;
        for booking in &affected {
            self.notifier
                .booking_event(NotificationKind::RideCancelled, &ride, booking, &booking.passenger_id);
        }

        info!("Ride {} cancelled, {} bookings cancelled with it", ride_id, affected.len());
        Ok(ride)
    }

    /// Published|Filled → Completed, then accepted bookings → Completed.
    pub async fn complete_ride(&self, ride_id: Uuid, driver_id: &str) -> CoreResult<Ride> {
        self.owned_ride(ride_id, driver_id).await?;
        let ride = self.ledger.complete_ride(ride_id).await?;

        let affected = self.cascade(&ride).await?;
        for booking in &affected {
            self.notifier
                .booking_event(NotificationKind::RideCompleted, &ride, booking, &booking.passenger_id);
        }

        info!("Ride {} completed, {} bookings completed", ride_id, affected.len());
        Ok(ride)
    }

    async fn cascade(&self, ride: &Ride) -> CoreResult<Vec<Booking>> {
        let bookings = self
            .bookings
            .list_bookings_for_ride(ride.id)
            .await
            .map_err(CoreError::storage)?;

        let mut affected = Vec::new();
        for booking in bookings.into_iter().filter(|b| b.status.is_active()) {
            if let Some(updated) = settle_booking(self.bookings.as_ref(), booking, ride.status).await? {
                affected.push(updated);
            }
        }
        Ok(affected)
    }

    async fn owned_ride(&self, ride_id: Uuid, driver_id: &str) -> CoreResult<Ride> {
        let ride = self.get_ride(ride_id).await?;
        if !ride.is_owned_by(driver_id) {
            return Err(CoreError::Unauthorized(format!(
                "ride {} belongs to another driver",
                ride_id
            )));
        }
        Ok(ride)
    }
}

/// Bring one booking in line with its ride's terminal status: everything
/// live is cancelled with a cancelled ride, accepted bookings complete with
/// a completed ride. Re-reads and retries when the status guard loses a race.
/// Returns the booking if this call moved it.
pub(crate) async fn settle_booking(
    bookings: &dyn BookingRepository,
    mut booking: Booking,
    ride_status: RideStatus,
) -> CoreResult<Option<Booking>> {
    loop {
        let action = match (ride_status, booking.status) {
            (RideStatus::Cancelled, status) if status.is_active() => BookingAction::Cancel,
            (RideStatus::Completed, BookingStatus::Accepted) => BookingAction::Complete,
            _ => return Ok(None),
        };
        let target = booking.status.apply(action)?;

        match bookings
            .transition_status(&booking, target, Utc::now())
            .await
            .map_err(CoreError::storage)?
        {
            Some(updated) => return Ok(Some(updated)),
            None => {
                booking = bookings
                    .get_booking(booking.id)
                    .await
                    .map_err(CoreError::storage)?
                    .ok_or_else(|| CoreError::booking_not_found(booking.id))?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_ride, Harness};
    use chrono::Duration;

    #[tokio::test]
    async fn test_unapproved_driver_cannot_publish() {
        let h = Harness::new();
        let result = h.rides.create_ride("stranger", new_ride(3)).await;
        assert!(matches!(result, Err(CoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_publish_and_search() {
        let h = Harness::new();
        let ride = h.publish(3).await;
        assert_eq!(ride.status, RideStatus::Published);
        assert_eq!(ride.available_seats, 3);

        let query = RideSearchQuery {
            from: "pune".to_string(),
            to: "mumbai".to_string(),
            date: None,
            min_seats: Some(3),
        };
        let found = h.rides.search_published_rides(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ride.id);

        let too_many = RideSearchQuery { min_seats: Some(4), ..query };
        assert!(h.rides.search_published_rides(&too_many).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_owner_edits_and_capacity_is_untouched() {
        let h = Harness::new();
        let ride = h.publish(3).await;
        let booking = h.book(ride.id, "rider-1", 2).await;
        h.bookings.accept_booking(booking.id, "driver-1").await.unwrap();

        let update = RideDetailsUpdate {
            price_per_seat: Some(520),
            departure_time: Some(Utc::now() + Duration::days(1)),
            ..Default::default()
        };
        assert!(matches!(
            h.rides.update_ride_fields(ride.id, "driver-2", update.clone()).await,
            Err(CoreError::Unauthorized(_))
        ));

        let updated = h.rides.update_ride_fields(ride.id, "driver-1", update).await.unwrap();
        assert_eq!(updated.price_per_seat, 520);
        assert_eq!(updated.available_seats, 1);
        assert_eq!(updated.total_seats, 3);
    }

    #[tokio::test]
    async fn test_resize_respects_accepted_seats() {
        let h = Harness::new();
        let ride = h.publish(4).await;
        let booking = h.book(ride.id, "rider-1", 3).await;
        h.bookings.accept_booking(booking.id, "driver-1").await.unwrap();

        assert!(matches!(
            h.rides.resize_ride(ride.id, "driver-1", 2).await,
            Err(CoreError::ValidationError(_))
        ));

        let resized = h.rides.resize_ride(ride.id, "driver-1", 3).await.unwrap();
        assert_eq!(resized.available_seats, 0);
        assert_eq!(resized.status, RideStatus::Filled);
        h.assert_ledger_consistent(ride.id).await;
    }

    // Scenario D
    #[tokio::test]
    async fn test_cancel_ride_cascades_to_bookings() {
        let mut h = Harness::new();
        let ride = h.publish(3).await;
        let pending = h.book(ride.id, "rider-1", 1).await;
        let accepted = h.book(ride.id, "rider-2", 2).await;
        h.bookings.accept_booking(accepted.id, "driver-1").await.unwrap();
        h.drain_events();

        let cancelled = h.rides.cancel_ride(ride.id, "driver-1").await.unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);
        // Frozen, not released
        assert_eq!(cancelled.available_seats, 1);

        for id in [pending.id, accepted.id] {
            let booking = h.bookings.get_booking(id).await.unwrap();
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }

        assert!(matches!(h.ledger.reserve(ride.id, 1).await, Err(CoreError::RideNotBookable(_))));
        assert!(matches!(h.ledger.release(ride.id, 1).await, Err(CoreError::RideNotBookable(_))));

        let kinds = h.drain_events();
        assert_eq!(kinds, vec![NotificationKind::RideCancelled, NotificationKind::RideCancelled]);
    }

    #[tokio::test]
    async fn test_cancel_ride_twice_is_invalid() {
        let h = Harness::new();
        let ride = h.publish(2).await;
        h.rides.cancel_ride(ride.id, "driver-1").await.unwrap();
        let before = h.rides.get_ride(ride.id).await.unwrap();

        assert!(matches!(
            h.rides.cancel_ride(ride.id, "driver-1").await,
            Err(CoreError::InvalidState(_))
        ));
        let after = h.rides.get_ride(ride.id).await.unwrap();
        assert_eq!(before.version, after.version);
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[tokio::test]
    async fn test_complete_ride_completes_accepted_only() {
        let h = Harness::new();
        let ride = h.publish(3).await;
        let pending = h.book(ride.id, "rider-1", 1).await;
        let accepted = h.book(ride.id, "rider-2", 2).await;
        h.bookings.accept_booking(accepted.id, "driver-1").await.unwrap();

        assert!(matches!(
            h.rides.complete_ride(ride.id, "rider-2").await,
            Err(CoreError::Unauthorized(_))
        ));

        let completed = h.rides.complete_ride(ride.id, "driver-1").await.unwrap();
        assert_eq!(completed.status, RideStatus::Completed);
        assert_eq!(completed.available_seats, 1);

        assert_eq!(h.bookings.get_booking(accepted.id).await.unwrap().status, BookingStatus::Completed);
        assert_eq!(h.bookings.get_booking(pending.id).await.unwrap().status, BookingStatus::Pending);

        // The leftover pending booking can never be accepted now
        assert!(matches!(
            h.bookings.accept_booking(pending.id, "driver-1").await,
            Err(CoreError::RideNotBookable(_))
        ));
        assert!(matches!(
            h.rides.cancel_ride(ride.id, "driver-1").await,
            Err(CoreError::InvalidState(_))
        ));
    }
}
