use ridepool_booking::{BookingService, DriverService, NotificationDispatcher, RideService};
use ridepool_core::repository::{BookingRepository, DriverRepository, RideRepository};
use ridepool_inventory::SeatLedger;
use ridepool_store::app_config::RateLimitConfig;
use ridepool_store::{InMemoryStore, RedisClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// The three repositories the services run on.
#[derive(Clone)]
pub struct Stores {
    pub rides: Arc<dyn RideRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub drivers: Arc<dyn DriverRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            rides: store.clone(),
            bookings: store.clone(),
            drivers: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub rides: Arc<RideService>,
    pub bookings: Arc<BookingService>,
    pub drivers: Arc<DriverService>,
    /// Absent: rate limiting is off.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(
        stores: Stores,
        notifier: NotificationDispatcher,
        max_cas_attempts: u32,
        auth: AuthConfig,
        redis: Option<Arc<RedisClient>>,
        rate_limit: RateLimitConfig,
    ) -> Self {
        let ledger = Arc::new(SeatLedger::with_max_attempts(stores.rides.clone(), max_cas_attempts));
        let drivers = Arc::new(DriverService::new(stores.drivers));
        let rides = Arc::new(RideService::new(
            stores.rides.clone(),
            stores.bookings.clone(),
            drivers.clone(),
            ledger.clone(),
            notifier.clone(),
        ));
        let bookings = Arc::new(BookingService::new(stores.rides, stores.bookings, ledger, notifier));

        Self {
            rides,
            bookings,
            drivers,
            redis,
            auth,
            rate_limit,
        }
    }
}
