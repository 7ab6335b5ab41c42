use async_trait::async_trait;
use ridepool_core::notify::NotificationSink;
use ridepool_core::{Booking, Ride};
use ridepool_shared::{NotificationEvent, NotificationKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Hands post-commit notifications to a background worker.
///
/// `emit` never blocks and never fails the caller: a full or closed queue
/// is logged and the event dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<NotificationEvent>,
}

impl NotificationDispatcher {
    /// Dispatcher plus the receiving end, for callers that drive delivery themselves.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Dispatcher whose events are delivered to `sink` by a spawned task.
    pub fn spawn(sink: Arc<dyn NotificationSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (dispatcher, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_worker(rx, sink));
        (dispatcher, handle)
    }

    pub fn emit(&self, event: NotificationEvent) {
        let kind = event.kind;
        match self.tx.try_send(event) {
            Ok(()) => debug!("Queued {} notification", kind.as_str()),
            Err(TrySendError::Full(event)) => warn!(
                "Notification queue full, dropping {} for ride {}",
                kind.as_str(),
                event.ride_id
            ),
            Err(TrySendError::Closed(event)) => warn!(
                "Notification worker gone, dropping {} for ride {}",
                kind.as_str(),
                event.ride_id
            ),
        }
    }

    /// Resolve (ride, booking, recipient) into an event and queue it.
    pub fn booking_event(&self, kind: NotificationKind, ride: &Ride, booking: &Booking, recipient_id: &str) {
        self.emit(NotificationEvent::new(
            kind,
            ride.id,
            Some(booking.id),
            recipient_id,
            Some(booking.seats_requested),
            ride.route_label(),
            ride.departure_time,
        ));
    }
}

async fn run_worker(mut rx: mpsc::Receiver<NotificationEvent>, sink: Arc<dyn NotificationSink>) {
    info!("Notification worker started");
    while let Some(event) = rx.recv().await {
        if let Err(e) = sink.deliver(&event).await {
            warn!(
                "Failed to deliver {} notification {} for ride {}: {}",
                event.kind.as_str(),
                event.event_id,
                event.ride_id,
                e
            );
        }
    }
    info!("Notification worker stopped");
}

/// Fallback sink when no message bus is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(
        &self,
        event: &NotificationEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Notification {} to {:?}: ride {} ({})",
            event.kind.as_str(),
            event.recipient_id,
            event.ride_id,
            event.route_label
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FlakySink {
        delivered: Mutex<Vec<NotificationKind>>,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn deliver(
            &self,
            event: &NotificationEvent,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if event.kind == NotificationKind::BookingRejected {
                return Err("smtp relay unavailable".into());
            }
            self.delivered.lock().unwrap().push(event.kind);
            Ok(())
        }
    }

    fn event(kind: NotificationKind) -> NotificationEvent {
        NotificationEvent::new(kind, Uuid::new_v4(), None, "rider-1", None, "A → B".to_string(), Utc::now())
    }

    #[tokio::test]
    async fn test_worker_survives_sink_failures() {
        let sink = Arc::new(FlakySink { delivered: Mutex::new(Vec::new()) });
        let (dispatcher, handle) = NotificationDispatcher::spawn(sink.clone(), 8);

        dispatcher.emit(event(NotificationKind::BookingRejected));
        dispatcher.emit(event(NotificationKind::BookingAccepted));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(*sink.delivered.lock().unwrap(), vec![NotificationKind::BookingAccepted]);
    }

    #[tokio::test]
    async fn test_emit_drops_when_queue_is_full() {
        let (dispatcher, mut rx) = NotificationDispatcher::channel(1);

        dispatcher.emit(event(NotificationKind::BookingRequested));
        dispatcher.emit(event(NotificationKind::BookingCancelled));

        assert_eq!(rx.recv().await.unwrap().kind, NotificationKind::BookingRequested);
        assert!(rx.try_recv().is_err());
    }
}
