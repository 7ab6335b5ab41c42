pub mod bookings;
pub mod drivers;
pub mod notifier;
pub mod rides;

#[cfg(test)]
mod testing;

pub use bookings::BookingService;
pub use drivers::DriverService;
pub use notifier::{LogSink, NotificationDispatcher};
pub use rides::RideService;
