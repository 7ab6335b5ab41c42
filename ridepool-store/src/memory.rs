use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::repository::{BookingRepository, DriverRepository, RepoResult, RideRepository};
use ridepool_core::{Booking, BookingStatus, DriverProfile, Ride, RideSearchQuery};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use uuid::Uuid;

type Slot<T> = Arc<Mutex<T>>;

/// Process-local store for development and tests.
///
/// The outer maps are only write-locked to add records. Each ride and
/// booking sits behind its own mutex, which is the conditional-update
/// primitive: the version/status guard is checked and the write applied
/// while holding it, so different rides never contend.
#[derive(Default)]
pub struct InMemoryStore {
    rides: RwLock<HashMap<Uuid, Slot<Ride>>>,
    bookings: RwLock<HashMap<Uuid, Slot<Booking>>>,
    drivers: RwLock<HashMap<String, DriverProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ride_slot(&self, id: Uuid) -> RepoResult<Option<Slot<Ride>>> {
        let rides = self.rides.read().map_err(poisoned)?;
        Ok(rides.get(&id).cloned())
    }

    fn booking_slot(&self, id: Uuid) -> RepoResult<Option<Slot<Booking>>> {
        let bookings = self.bookings.read().map_err(poisoned)?;
        Ok(bookings.get(&id).cloned())
    }

    fn all_rides(&self) -> RepoResult<Vec<Ride>> {
        let slots: Vec<Slot<Ride>> = self.rides.read().map_err(poisoned)?.values().cloned().collect();
        let mut rides = Vec::with_capacity(slots.len());
        for slot in slots {
            rides.push(slot.lock().map_err(poisoned)?.clone());
        }
        Ok(rides)
    }

    fn bookings_where<F>(&self, predicate: F) -> RepoResult<Vec<Booking>>
    where
        F: Fn(&Booking) -> bool,
    {
        let slots: Vec<Slot<Booking>> = self.bookings.read().map_err(poisoned)?.values().cloned().collect();
        let mut found = Vec::new();
        for slot in slots {
            let booking = slot.lock().map_err(poisoned)?;
            if predicate(&booking) {
                found.push(booking.clone());
            }
        }
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

fn poisoned<T>(_: PoisonError<T>) -> Box<dyn std::error::Error + Send + Sync> {
    "in-memory store lock poisoned".into()
}

#[async_trait]
impl RideRepository for InMemoryStore {
    async fn insert_ride(&self, ride: &Ride) -> RepoResult<()> {
        let mut rides = self.rides.write().map_err(poisoned)?;
        if rides.contains_key(&ride.id) {
            return Err(format!("ride {} already exists", ride.id).into());
        }
        rides.insert(ride.id, Arc::new(Mutex::new(ride.clone())));
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> RepoResult<Option<Ride>> {
        match self.ride_slot(id)? {
            Some(slot) => Ok(Some(slot.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn swap_inventory(&self, ride: &Ride, expected_version: i64) -> RepoResult<bool> {
        let Some(slot) = self.ride_slot(ride.id)? else {
            return Ok(false);
        };
        let mut stored = slot.lock().map_err(poisoned)?;
        if stored.version != expected_version {
            return Ok(false);
        }
        stored.total_seats = ride.total_seats;
        stored.available_seats = ride.available_seats;
        stored.status = ride.status;
        stored.version = ride.version;
        stored.updated_at = ride.updated_at;
        Ok(true)
    }

    async fn update_details(&self, ride: &Ride) -> RepoResult<bool> {
        let Some(slot) = self.ride_slot(ride.id)? else {
            return Ok(false);
        };
        let mut stored = slot.lock().map_err(poisoned)?;
        if stored.status.is_terminal() {
            return Ok(false);
        }
        stored.start_location = ride.start_location.clone();
        stored.end_location = ride.end_location.clone();
        stored.route = ride.route.clone();
        stored.departure_time = ride.departure_time;
        stored.price_per_seat = ride.price_per_seat;
        stored.vehicle = ride.vehicle.clone();
        stored.updated_at = ride.updated_at;
        Ok(true)
    }

    async fn search_published(
        &self,
        query: &RideSearchQuery,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Ride>> {
        let mut rides: Vec<Ride> = self
            .all_rides()?
            .into_iter()
            .filter(|ride| query.matches(ride, now))
            .collect();
        rides.sort_by_key(|ride| ride.departure_time);
        Ok(rides)
    }

    async fn list_rides_for_driver(&self, driver_id: &str) -> RepoResult<Vec<Ride>> {
        let mut rides: Vec<Ride> = self
            .all_rides()?
            .into_iter()
            .filter(|ride| ride.driver_id == driver_id)
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rides)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<bool> {
        // Holding the map's write lock makes the duplicate check and the insert one step.
        let mut bookings = self.bookings.write().map_err(poisoned)?;
        for slot in bookings.values() {
            let existing = slot.lock().map_err(poisoned)?;
            if existing.id == booking.id {
                return Err(format!("booking {} already exists", booking.id).into());
            }
            if existing.ride_id == booking.ride_id
                && existing.passenger_id == booking.passenger_id
                && existing.status.is_active()
            {
                return Ok(false);
            }
        }
        bookings.insert(booking.id, Arc::new(Mutex::new(booking.clone())));
        Ok(true)
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        match self.booking_slot(id)? {
            Some(slot) => Ok(Some(slot.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.bookings_where(|booking| booking.ride_id == ride_id)
    }

    async fn list_bookings_for_passenger(&self, passenger_id: &str) -> RepoResult<Vec<Booking>> {
        self.bookings_where(|booking| booking.passenger_id == passenger_id)
    }

    async fn transition_status(
        &self,
        current: &Booking,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>> {
        let Some(slot) = self.booking_slot(current.id)? else {
            return Ok(None);
        };
        let mut booking = slot.lock().map_err(poisoned)?;
        if booking.status != current.status || booking.seats_requested != current.seats_requested {
            return Ok(None);
        }
        booking.status = to;
        booking.updated_at = now;
        Ok(Some(booking.clone()))
    }

    async fn update_seats(
        &self,
        current: &Booking,
        to_seats: i32,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>> {
        let Some(slot) = self.booking_slot(current.id)? else {
            return Ok(None);
        };
        let mut booking = slot.lock().map_err(poisoned)?;
        if booking.status != current.status || booking.seats_requested != current.seats_requested {
            return Ok(None);
        }
        booking.seats_requested = to_seats;
        booking.updated_at = now;
        Ok(Some(booking.clone()))
    }
}

#[async_trait]
impl DriverRepository for InMemoryStore {
    async fn get_driver(&self, user_id: &str) -> RepoResult<Option<DriverProfile>> {
        let drivers = self.drivers.read().map_err(poisoned)?;
        Ok(drivers.get(user_id).cloned())
    }

    async fn save_driver(&self, profile: &DriverProfile) -> RepoResult<()> {
        let mut drivers = self.drivers.write().map_err(poisoned)?;
        drivers.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn list_pending_drivers(&self) -> RepoResult<Vec<DriverProfile>> {
        let drivers = self.drivers.read().map_err(poisoned)?;
        let mut pending: Vec<DriverProfile> = drivers
            .values()
            .filter(|profile| profile.status == ridepool_core::DriverStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|profile| profile.applied_at);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ridepool_core::{Coordinates, Location, NewRide, Vehicle};

    fn ride() -> Ride {
        let place = |name: &str| Location {
            name: name.to_string(),
            coordinates: Coordinates { lat: 28.61, lng: 77.20 },
        };
        Ride::publish(
            "driver-9",
            NewRide {
                start_location: place("Delhi"),
                end_location: place("Jaipur"),
                route: vec![],
                departure_time: Utc::now() + Duration::hours(12),
                total_seats: 4,
                price_per_seat: 700,
                vehicle: Vehicle {
                    model: "Ertiga".to_string(),
                    number: "DL3CAB0001".to_string(),
                    image_url: None,
                },
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_swap_inventory_rejects_stale_version() {
        let store = InMemoryStore::new();
        let original = ride();
        store.insert_ride(&original).await.unwrap();

        let mut first = original.clone();
        first.reserve(1, Utc::now()).unwrap();
        assert!(store.swap_inventory(&first, 0).await.unwrap());

        // A second writer that read version 0 loses
        let mut stale = original.clone();
        stale.reserve(2, Utc::now()).unwrap();
        assert!(!store.swap_inventory(&stale, 0).await.unwrap());

        let stored = store.get_ride(original.id).await.unwrap().unwrap();
        assert_eq!(stored.available_seats, 3);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_update_details_does_not_touch_seats() {
        let store = InMemoryStore::new();
        let original = ride();
        store.insert_ride(&original).await.unwrap();

        let mut reserved = original.clone();
        reserved.reserve(2, Utc::now()).unwrap();
        store.swap_inventory(&reserved, 0).await.unwrap();

        // Edit made from a copy read before the reservation
        let mut edited = original.clone();
        edited.price_per_seat = 650;
        assert!(store.update_details(&edited).await.unwrap());

        let stored = store.get_ride(original.id).await.unwrap().unwrap();
        assert_eq!(stored.price_per_seat, 650);
        assert_eq!(stored.available_seats, 2);
    }

    #[tokio::test]
    async fn test_booking_status_guard() {
        let store = InMemoryStore::new();
        let ride = ride();
        let booking = Booking::request(&ride, "rider-3", 1, Utc::now()).unwrap();
        assert!(store.insert_booking(&booking).await.unwrap());

        let accepted = store
            .transition_status(&booking, BookingStatus::Accepted, Utc::now())
            .await
            .unwrap();
        assert_eq!(accepted.unwrap().status, BookingStatus::Accepted);

        // `booking` is the stale pending copy
        let again = store
            .transition_status(&booking, BookingStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        assert!(again.is_none());

        let mut edited = booking.clone();
        edited.status = BookingStatus::Accepted;
        edited.seats_requested = 3;
        let wrong_seats = store.transition_status(&edited, BookingStatus::Cancelled, Utc::now()).await.unwrap();
        assert!(wrong_seats.is_none());
    }

    #[tokio::test]
    async fn test_one_active_booking_per_passenger_and_ride() {
        let store = InMemoryStore::new();
        let ride = ride();
        let first = Booking::request(&ride, "rider-3", 1, Utc::now()).unwrap();
        assert!(store.insert_booking(&first).await.unwrap());
        // Same id twice is a storage error, not a duplicate
        assert!(store.insert_booking(&first).await.is_err());

        let second = Booking::request(&ride, "rider-3", 2, Utc::now()).unwrap();
        assert!(!store.insert_booking(&second).await.unwrap());
        assert_eq!(store.list_bookings_for_passenger("rider-3").await.unwrap().len(), 1);

        store
            .transition_status(&first, BookingStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        assert!(store.insert_booking(&second).await.unwrap());
        assert_eq!(store.list_bookings_for_passenger("rider-3").await.unwrap().len(), 2);
    }
}
