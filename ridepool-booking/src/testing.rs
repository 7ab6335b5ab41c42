use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ridepool_core::repository::{BookingRepository, RepoResult, RideRepository};
use ridepool_core::{
    Booking, BookingStatus, Coordinates, Location, NewRide, Ride, RideSearchQuery, Vehicle,
};
use ridepool_inventory::SeatLedger;
use ridepool_shared::{NotificationEvent, NotificationKind};
use ridepool_store::InMemoryStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::{BookingService, DriverService, NotificationDispatcher, RideService};

pub(crate) const DRIVER: &str = "driver-1";

pub(crate) fn vehicle() -> Vehicle {
    Vehicle {
        model: "Swift Dzire".to_string(),
        number: "MH12AB1234".to_string(),
        image_url: None,
    }
}

pub(crate) fn new_ride(total_seats: i32) -> NewRide {
    NewRide {
        start_location: Location {
            name: "Pune Station".to_string(),
            coordinates: Coordinates { lat: 18.52, lng: 73.85 },
        },
        end_location: Location {
            name: "Mumbai Central".to_string(),
            coordinates: Coordinates { lat: 18.97, lng: 72.82 },
        },
        route: Vec::new(),
        departure_time: Utc::now() + Duration::hours(6),
        total_seats,
        price_per_seat: 450,
        vehicle: vehicle(),
    }
}

/// Services wired against one in-memory store, with the notification
/// queue left undrained so tests can inspect what was emitted.
pub(crate) struct Harness {
    pub store: Arc<InMemoryStore>,
    pub drivers: Arc<DriverService>,
    pub ledger: Arc<SeatLedger>,
    pub rides: Arc<RideService>,
    pub bookings: Arc<BookingService>,
    events: Option<mpsc::Receiver<NotificationEvent>>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let (notifier, rx) = NotificationDispatcher::channel(64);
        Self::build(store.clone(), store.clone(), store, notifier, Some(rx))
    }

    /// Bookings go through `repo` instead of the plain store.
    pub fn with_booking_repo(store: Arc<InMemoryStore>, repo: Arc<dyn BookingRepository>) -> Self {
        let (notifier, rx) = NotificationDispatcher::channel(64);
        Self::build(store.clone(), store, repo, notifier, Some(rx))
    }

    /// Rides, and so every ledger write, go through `repo`.
    pub fn with_ride_repo(store: Arc<InMemoryStore>, repo: Arc<dyn RideRepository>) -> Self {
        let (notifier, rx) = NotificationDispatcher::channel(64);
        Self::build(store.clone(), repo, store, notifier, Some(rx))
    }

    pub fn with_notifier(notifier: NotificationDispatcher) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::build(store.clone(), store.clone(), store, notifier, None)
    }

    fn build(
        store: Arc<InMemoryStore>,
        ride_repo: Arc<dyn RideRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        notifier: NotificationDispatcher,
        events: Option<mpsc::Receiver<NotificationEvent>>,
    ) -> Self {
        let drivers = Arc::new(DriverService::new(store.clone()));
        let ledger = Arc::new(SeatLedger::new(ride_repo.clone()));
        let rides = Arc::new(RideService::new(
            ride_repo.clone(),
            booking_repo.clone(),
            drivers.clone(),
            ledger.clone(),
            notifier.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            ride_repo,
            booking_repo,
            ledger.clone(),
            notifier,
        ));

        Self {
            store,
            drivers,
            ledger,
            rides,
            bookings,
            events,
        }
    }

    pub async fn publish(&self, total_seats: i32) -> Ride {
        if self.drivers.ensure_approved(DRIVER).await.is_err() {
            self.drivers.submit_application(DRIVER, vehicle()).await.unwrap();
            self.drivers.review_application(DRIVER, true, "admin-1").await.unwrap();
        }
        self.rides.create_ride(DRIVER, new_ride(total_seats)).await.unwrap()
    }

    pub async fn book(&self, ride_id: Uuid, passenger_id: &str, seats: i32) -> Booking {
        self.bookings
            .create_booking(ride_id, passenger_id, seats)
            .await
            .unwrap()
    }

    pub async fn ride(&self, ride_id: Uuid) -> Ride {
        self.store.get_ride(ride_id).await.unwrap().unwrap()
    }

    /// Kinds of every notification queued so far, oldest first.
    pub fn drain_events(&mut self) -> Vec<NotificationKind> {
        let mut kinds = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                kinds.push(event.kind);
            }
        }
        kinds
    }

    /// availableSeats == totalSeats − Σ seats of accepted bookings
    pub async fn assert_ledger_consistent(&self, ride_id: Uuid) {
        let ride = self.ride(ride_id).await;
        let held: i32 = self
            .store
            .list_bookings_for_ride(ride_id)
            .await
            .unwrap()
            .iter()
            .filter(|b| b.status.holds_seats())
            .map(|b| b.seats_requested)
            .sum();
        assert_eq!(
            ride.available_seats,
            ride.total_seats - held,
            "ride {} has {} of {} seats available but accepted bookings hold {}",
            ride.id,
            ride.available_seats,
            ride.total_seats,
            held
        );
        assert!(ride.available_seats >= 0);
    }
}

/// Holds calls at a known point until the test lets them through.
pub(crate) struct Gate {
    entered: Semaphore,
    proceed: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            entered: Semaphore::new(0),
            proceed: Semaphore::new(0),
        }
    }
}

impl Gate {
    async fn pass(&self) {
        self.entered.add_permits(1);
        if let Ok(permit) = self.proceed.acquire().await {
            permit.forget();
        }
    }

    /// Wait until `calls` callers are parked at the gate.
    pub async fn wait_for(&self, calls: u32) {
        self.entered.acquire_many(calls).await.unwrap().forget();
    }

    pub fn open(&self, calls: usize) {
        self.proceed.add_permits(calls);
    }
}

/// Delegates to the store, with switchable failures.
pub(crate) struct FaultyBookings {
    inner: Arc<InMemoryStore>,
    fail_accepts: AtomicBool,
    fail_seat_updates: AtomicBool,
    insert_gate: Option<Arc<Gate>>,
}

impl FaultyBookings {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            fail_accepts: AtomicBool::new(false),
            fail_seat_updates: AtomicBool::new(false),
            insert_gate: None,
        }
    }

    /// Every insert waits on the returned gate before reaching the store.
    pub fn gated_inserts(inner: Arc<InMemoryStore>) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let repo = Self {
            insert_gate: Some(gate.clone()),
            ..Self::new(inner)
        };
        (repo, gate)
    }

    pub fn fail_accepts(&self, fail: bool) {
        self.fail_accepts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_seat_updates(&self, fail: bool) {
        self.fail_seat_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingRepository for FaultyBookings {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<bool> {
        if let Some(gate) = &self.insert_gate {
            gate.pass().await;
        }
        self.inner.insert_booking(booking).await
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        self.inner.get_booking(id).await
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.inner.list_bookings_for_ride(ride_id).await
    }

    async fn list_bookings_for_passenger(&self, passenger_id: &str) -> RepoResult<Vec<Booking>> {
        self.inner.list_bookings_for_passenger(passenger_id).await
    }

    async fn transition_status(
        &self,
        current: &Booking,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>> {
        if to == BookingStatus::Accepted && self.fail_accepts.load(Ordering::SeqCst) {
            return Err("connection reset by peer".into());
        }
        self.inner.transition_status(current, to, now).await
    }

    async fn update_seats(
        &self,
        current: &Booking,
        to_seats: i32,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>> {
        if self.fail_seat_updates.load(Ordering::SeqCst) {
            return Err("connection reset by peer".into());
        }
        self.inner.update_seats(current, to_seats, now).await
    }
}

/// Delegates to the store; seat and status writes can be switched off.
pub(crate) struct FaultyRides {
    inner: Arc<InMemoryStore>,
    fail_swaps: AtomicBool,
}

impl FaultyRides {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            fail_swaps: AtomicBool::new(false),
        }
    }

    pub fn fail_swaps(&self, fail: bool) {
        self.fail_swaps.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RideRepository for FaultyRides {
    async fn insert_ride(&self, ride: &Ride) -> RepoResult<()> {
        self.inner.insert_ride(ride).await
    }

    async fn get_ride(&self, id: Uuid) -> RepoResult<Option<Ride>> {
        self.inner.get_ride(id).await
    }

    async fn swap_inventory(&self, ride: &Ride, expected_version: i64) -> RepoResult<bool> {
        if self.fail_swaps.load(Ordering::SeqCst) {
            return Err("statement timeout".into());
        }
        self.inner.swap_inventory(ride, expected_version).await
    }

    async fn update_details(&self, ride: &Ride) -> RepoResult<bool> {
        self.inner.update_details(ride).await
    }

    async fn search_published(
        &self,
        query: &RideSearchQuery,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Ride>> {
        self.inner.search_published(query, now).await
    }

    async fn list_rides_for_driver(&self, driver_id: &str) -> RepoResult<Vec<Ride>> {
        self.inner.list_rides_for_driver(driver_id).await
    }
}
