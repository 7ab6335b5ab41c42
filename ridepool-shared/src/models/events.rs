use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pii::Masked;

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Sent to the driver when a passenger requests seats.
    BookingRequested,
    /// Sent to the passenger.
    BookingAccepted,
    /// Sent to the passenger.
    BookingRejected,
    /// Sent to the driver when a passenger withdraws.
    BookingCancelled,
    /// Sent to every passenger with a live booking.
    RideCancelled,
    RideCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequested => "BOOKING_REQUESTED",
            NotificationKind::BookingAccepted => "BOOKING_ACCEPTED",
            NotificationKind::BookingRejected => "BOOKING_REJECTED",
            NotificationKind::BookingCancelled => "BOOKING_CANCELLED",
            NotificationKind::RideCancelled => "RIDE_CANCELLED",
            NotificationKind::RideCompleted => "RIDE_COMPLETED",
        }
    }
}

/// Outbound message emitted after a state transition has committed.
///
/// The ride/booking/recipient tuple is resolved by the emitter so the
/// consumer never has to read the stores back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_id: Uuid,
    pub kind: NotificationKind,
    pub ride_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub recipient_id: Masked<String>,
    pub seats: Option<i32>,
    pub route_label: String,
    pub departure_time: DateTime<Utc>,
    pub timestamp: i64,
}

impl NotificationEvent {
    pub fn new(
        kind: NotificationKind,
        ride_id: Uuid,
        booking_id: Option<Uuid>,
        recipient_id: &str,
        seats: Option<i32>,
        route_label: String,
        departure_time: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            ride_id,
            booking_id,
            recipient_id: recipient_id.into(),
            seats,
            route_label,
            departure_time,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Partition key for the message bus; keeps one ride's events ordered.
    pub fn key(&self) -> String {
        self.ride_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_kind_and_recipient() {
        let ride_id = Uuid::new_v4();
        let event = NotificationEvent::new(
            NotificationKind::BookingAccepted,
            ride_id,
            Some(Uuid::new_v4()),
            "rider-1",
            Some(2),
            "Pune → Mumbai".to_string(),
            Utc::now(),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "BOOKING_ACCEPTED");
        assert_eq!(json["recipient_id"], "rider-1");
        assert_eq!(event.key(), ride_id.to_string());
        assert!(!format!("{:?}", event).contains("rider-1"));
    }
}
