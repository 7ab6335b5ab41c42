use chrono::Utc;
use ridepool_core::booking::validate_seats;
use ridepool_core::repository::{BookingRepository, RideRepository};
use ridepool_core::{
    Booking, BookingAction, BookingStatus, CoreError, CoreResult, Ride, RideStatus,
};
use ridepool_inventory::SeatLedger;
use ridepool_shared::NotificationKind;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notifier::NotificationDispatcher;
use crate::rides::settle_booking;

/// Booking lifecycle. Every transition that consumes or returns seats goes
/// through the [`SeatLedger`]; the booking write is made conditional on the
/// status and seat count that were read, and undone if its ledger half fails.
pub struct BookingService {
    rides: Arc<dyn RideRepository>,
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<SeatLedger>,
    notifier: NotificationDispatcher,
}

impl BookingService {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<SeatLedger>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            rides,
            bookings,
            ledger,
            notifier,
        }
    }

    /// Create a `Pending` booking. Seats are only checked, not taken.
    pub async fn create_booking(&self, ride_id: Uuid, passenger_id: &str, seats: i32) -> CoreResult<Booking> {
        if seats < 1 {
            return Err(CoreError::ValidationError(
                "at least one seat must be requested".to_string(),
            ));
        }

        let now = Utc::now();
        let ride = self.get_ride(ride_id).await?;
        // A filled ride is sold out rather than closed
        match ride.status {
            RideStatus::Filled if !ride.has_departed(now) => {}
            _ => ride.ensure_open_for_booking(now)?,
        }

        let booking = Booking::request(&ride, passenger_id, seats, now)?;
        if seats > ride.available_seats {
            return Err(CoreError::InsufficientSeats {
                requested: seats,
                available: ride.available_seats,
            });
        }

        let existing = self
            .bookings
            .list_bookings_for_passenger(passenger_id)
            .await
            .map_err(CoreError::storage)?;
        if let Some(active) = existing
            .iter()
            .find(|b| b.ride_id == ride_id && b.status.is_active())
        {
            return Err(CoreError::InvalidState(format!(
                "passenger already holds booking {} on ride {}",
                active.id, ride_id
            )));
        }

        let inserted = self
            .bookings
            .insert_booking(&booking)
            .await
            .map_err(CoreError::storage)?;
        if !inserted {
            return Err(CoreError::InvalidState(format!(
                "passenger already holds a booking on ride {}",
                ride_id
            )));
        }

        // A cancel or complete that ran its cascade before the insert never saw this booking
        let ride = self.get_ride(ride_id).await?;
        if ride.status.is_terminal() {
            if ride.status == RideStatus::Cancelled {
                settle_booking(self.bookings.as_ref(), booking, ride.status).await?;
            } else {
                // Completion leaves pending bookings alone, so withdraw this one explicitly
                self.bookings
                    .transition_status(&booking, BookingStatus::Cancelled, Utc::now())
                    .await
                    .map_err(CoreError::storage)?;
            }
            return Err(CoreError::RideNotBookable(format!(
                "ride {} was {} while the booking was being made",
                ride_id,
                ride.status.as_str()
            )));
        }

        info!(
            "Booking {} requested: {} seats on ride {} by {}",
            booking.id, seats, ride_id, passenger_id
        );
        self.notifier
            .booking_event(NotificationKind::BookingRequested, &ride, &booking, &ride.driver_id);
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::booking_not_found(booking_id))
    }

    /// All bookings on a ride, visible to its driver only.
    pub async fn list_bookings_for_ride(&self, ride_id: Uuid, driver_id: &str) -> CoreResult<Vec<Booking>> {
        let ride = self.get_ride(ride_id).await?;
        ensure_driver(&ride, driver_id)?;
        self.bookings
            .list_bookings_for_ride(ride_id)
            .await
            .map_err(CoreError::storage)
    }

    pub async fn list_bookings_for_passenger(&self, passenger_id: &str) -> CoreResult<Vec<Booking>> {
        self.bookings
            .list_bookings_for_passenger(passenger_id)
            .await
            .map_err(CoreError::storage)
    }

    /// Pending → Accepted. Reserve first, then the conditional status write;
    /// if the write does not land the seats are handed back.
    pub async fn accept_booking(&self, booking_id: Uuid, driver_id: &str) -> CoreResult<Booking> {
        let booking = self.get_booking(booking_id).await?;
        let ride = self.get_ride(booking.ride_id).await?;
        ensure_driver(&ride, driver_id)?;
        let target = booking.status.apply(BookingAction::Accept)?;

        self.ledger.reserve(ride.id, booking.seats_requested).await?;

        let accepted = match self
            .bookings
            .transition_status(&booking, target, Utc::now())
            .await
        {
            Ok(Some(accepted)) => accepted,
            Ok(None) => {
                self.return_seats(ride.id, booking.seats_requested).await;
                return Err(self.conflict(booking_id).await);
            }
            Err(e) => {
                self.return_seats(ride.id, booking.seats_requested).await;
                return Err(CoreError::storage(e));
            }
        };

        // The ride may have closed between the reserve and the status write
        let ride = self.get_ride(ride.id).await?;
        if ride.status.is_terminal() {
            warn!(
                "Ride {} became {} while booking {} was accepted",
                ride.id,
                ride.status.as_str(),
                booking_id
            );
            return match settle_booking(self.bookings.as_ref(), accepted, ride.status).await? {
                Some(settled) => Ok(settled),
                None => self.get_booking(booking_id).await,
            };
        }

        info!(
            "Booking {} accepted: {} seats on ride {}, {} left",
            booking_id, accepted.seats_requested, ride.id, ride.available_seats
        );
        self.notifier
            .booking_event(NotificationKind::BookingAccepted, &ride, &accepted, &accepted.passenger_id);
        Ok(accepted)
    }

    /// Pending → Rejected. No seat is involved.
    pub async fn reject_booking(&self, booking_id: Uuid, driver_id: &str) -> CoreResult<Booking> {
        let booking = self.get_booking(booking_id).await?;
        let ride = self.get_ride(booking.ride_id).await?;
        ensure_driver(&ride, driver_id)?;
        let target = booking.status.apply(BookingAction::Reject)?;

        let rejected = match self
            .bookings
            .transition_status(&booking, target, Utc::now())
            .await
            .map_err(CoreError::storage)?
        {
            Some(rejected) => rejected,
            None => return Err(self.conflict(booking_id).await),
        };

        info!("Booking {} rejected on ride {}", booking_id, ride.id);
        self.notifier
            .booking_event(NotificationKind::BookingRejected, &ride, &rejected, &rejected.passenger_id);
        Ok(rejected)
    }

    /// Pending|Accepted → Cancelled by the passenger. An accepted booking
    /// gives its seats back after the status write lands.
    pub async fn cancel_booking(&self, booking_id: Uuid, passenger_id: &str) -> CoreResult<Booking> {
        let booking = self.get_booking(booking_id).await?;
        ensure_passenger(&booking, passenger_id)?;
        let target = booking.status.apply(BookingAction::Cancel)?;

        let cancelled = match self
            .bookings
            .transition_status(&booking, target, Utc::now())
            .await
            .map_err(CoreError::storage)?
        {
            Some(cancelled) => cancelled,
            None => return Err(self.conflict(booking_id).await),
        };

        if booking.status.holds_seats() {
            match self.ledger.release(booking.ride_id, booking.seats_requested).await {
                Ok(outcome) => info!(
                    "Released {} seats on ride {}, {} now available",
                    booking.seats_requested, booking.ride_id, outcome.available_seats
                ),
                Err(CoreError::RideNotBookable(_)) => {
                    let ride = self.get_ride(booking.ride_id).await?;
                    if ride.status == RideStatus::Completed {
                        self.restore(&cancelled, BookingStatus::Completed).await;
                        return Err(CoreError::InvalidState(format!(
                            "ride {} completed before booking {} could be cancelled",
                            ride.id, booking_id
                        )));
                    }
                    // Cancelled ride: the counter is frozen and the cancellation stands
                }
                Err(e) => {
                    self.restore(&cancelled, BookingStatus::Accepted).await;
                    return Err(e);
                }
            }
        }

        info!(
            "Booking {} cancelled by passenger (was {})",
            booking_id,
            booking.status.as_str()
        );
        if let Ok(ride) = self.get_ride(booking.ride_id).await {
            self.notifier
                .booking_event(NotificationKind::BookingCancelled, &ride, &cancelled, &ride.driver_id);
        }
        Ok(cancelled)
    }

    /// Change the seat count. Pending bookings only change the number;
    /// accepted ones re-reserve the difference against current availability.
    pub async fn update_booking(&self, booking_id: Uuid, passenger_id: &str, new_seats: i32) -> CoreResult<Booking> {
        let booking = self.get_booking(booking_id).await?;
        ensure_passenger(&booking, passenger_id)?;
        let ride = self.get_ride(booking.ride_id).await?;
        validate_seats(&ride, new_seats)?;

        if new_seats == booking.seats_requested && booking.status.is_active() {
            return Ok(booking);
        }

        match booking.status {
            BookingStatus::Pending => self.write_seats(&booking, new_seats).await,
            BookingStatus::Accepted if new_seats > booking.seats_requested => {
                self.grow_accepted(&booking, new_seats).await
            }
            BookingStatus::Accepted => self.shrink_accepted(&booking, new_seats).await,
            other => Err(CoreError::InvalidState(format!(
                "booking {} is {} and can no longer be edited",
                booking_id,
                other.as_str()
            ))),
        }
    }

    async fn grow_accepted(&self, booking: &Booking, new_seats: i32) -> CoreResult<Booking> {
        let delta = new_seats - booking.seats_requested;
        self.ledger.reserve(booking.ride_id, delta).await?;

        match self.bookings.update_seats(booking, new_seats, Utc::now()).await {
            Ok(Some(updated)) => {
                info!(
                    "Booking {} grew to {} seats on ride {}",
                    booking.id, new_seats, booking.ride_id
                );
                Ok(updated)
            }
            Ok(None) => {
                self.return_seats(booking.ride_id, delta).await;
                Err(self.conflict(booking.id).await)
            }
            Err(e) => {
                self.return_seats(booking.ride_id, delta).await;
                Err(CoreError::storage(e))
            }
        }
    }

    async fn shrink_accepted(&self, booking: &Booking, new_seats: i32) -> CoreResult<Booking> {
        let delta = booking.seats_requested - new_seats;
        let updated = self.write_seats(booking, new_seats).await?;

        if let Err(e) = self.ledger.release(booking.ride_id, delta).await {
            match self
                .bookings
                .update_seats(&updated, booking.seats_requested, Utc::now())
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => error!(
                    "Booking {} holds {} seats but ride {} still counts {}",
                    booking.id, new_seats, booking.ride_id, booking.seats_requested
                ),
            }
            return Err(e);
        }

        info!(
            "Booking {} shrank to {} seats on ride {}",
            booking.id, new_seats, booking.ride_id
        );
        Ok(updated)
    }

    async fn write_seats(&self, booking: &Booking, new_seats: i32) -> CoreResult<Booking> {
        match self
            .bookings
            .update_seats(booking, new_seats, Utc::now())
            .await
            .map_err(CoreError::storage)?
        {
            Some(updated) => Ok(updated),
            None => Err(self.conflict(booking.id).await),
        }
    }

    /// Compensation for a reserve whose booking write did not land.
    async fn return_seats(&self, ride_id: Uuid, seats: i32) {
        match self.ledger.release(ride_id, seats).await {
            Ok(_) => warn!("Compensated: released {} seats on ride {}", seats, ride_id),
            // Frozen ride, nothing to hand back
            Err(CoreError::RideNotBookable(_)) => {}
            Err(e) => error!(
                "Failed to release {} seats on ride {} after an aborted booking write: {}",
                seats, ride_id, e
            ),
        }
    }

    /// Put a booking back after its ledger half failed.
    async fn restore(&self, current: &Booking, to: BookingStatus) {
        match self.bookings.transition_status(current, to, Utc::now()).await {
            Ok(Some(_)) => warn!("Booking {} restored to {}", current.id, to.as_str()),
            Ok(None) => error!(
                "Booking {} changed before it could be restored to {}",
                current.id,
                to.as_str()
            ),
            Err(e) => error!(
                "Failed to restore booking {} to {}: {}",
                current.id,
                to.as_str(),
                e
            ),
        }
    }

    /// The error for a conditional write that found the booking changed.
    async fn conflict(&self, booking_id: Uuid) -> CoreError {
        match self.get_booking(booking_id).await {
            Ok(current) => CoreError::InvalidState(format!(
                "booking {} changed concurrently and is now {} for {} seats",
                booking_id,
                current.status.as_str(),
                current.seats_requested
            )),
            Err(e) => e,
        }
    }

    async fn get_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        self.rides
            .get_ride(ride_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::ride_not_found(ride_id))
    }
}

fn ensure_driver(ride: &Ride, driver_id: &str) -> CoreResult<()> {
    if !ride.is_owned_by(driver_id) {
        return Err(CoreError::Unauthorized(format!(
            "ride {} belongs to another driver",
            ride.id
        )));
    }
    Ok(())
}

fn ensure_passenger(booking: &Booking, passenger_id: &str) -> CoreResult<()> {
    if !booking.is_owned_by(passenger_id) {
        return Err(CoreError::Unauthorized(format!(
            "booking {} belongs to another passenger",
            booking.id
        )));
    }
    Ok(())
}
