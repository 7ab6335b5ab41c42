use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::ride::{Ride, RideStatus};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct RideSearchQuery {
    pub from: String,
    pub to: String,
    pub date: Option<NaiveDate>, // UTC calendar day of departure
    pub min_seats: Option<i32>,
}

impl RideSearchQuery {
    pub fn min_seats(&self) -> i32 {
        self.min_seats.unwrap_or(1)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "both origin and destination are required".to_string(),
            ));
        }
        if self.min_seats() < 1 {
            return Err(CoreError::ValidationError(
                "min_seats must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Published, not departed, enough seats, and the endpoints match.
    pub fn matches(&self, ride: &Ride, now: DateTime<Utc>) -> bool {
        ride.status == RideStatus::Published
            && ride.departure_time >= now
            && ride.available_seats >= self.min_seats()
            && name_matches(&ride.start_location.name, &self.from)
            && name_matches(&ride.end_location.name, &self.to)
            && self
                .date
                .map_or(true, |date| ride.departure_time.date_naive() == date)
    }
}

fn name_matches(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(needle.trim().to_lowercase().as_str())
}
