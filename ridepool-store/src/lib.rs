pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod driver_repo;
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod ride_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use driver_repo::PgDriverRepository;
pub use events::EventProducer;
pub use memory::InMemoryStore;
pub use redis_repo::RedisClient;
pub use ride_repo::PgRideRepository;
