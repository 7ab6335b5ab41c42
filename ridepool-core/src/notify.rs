use async_trait::async_trait;
use ridepool_shared::NotificationEvent;

/// Where committed-transition notifications end up (email relay, message bus, log).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        event: &NotificationEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
