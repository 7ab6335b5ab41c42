use chrono::Utc;
use ridepool_core::repository::DriverRepository;
use ridepool_core::{CoreError, CoreResult, DriverProfile, Vehicle};
use std::sync::Arc;
use tracing::info;

/// Driver applications and their admin review.
pub struct DriverService {
    drivers: Arc<dyn DriverRepository>,
}

impl DriverService {
    pub fn new(drivers: Arc<dyn DriverRepository>) -> Self {
        Self { drivers }
    }

    pub async fn submit_application(&self, user_id: &str, vehicle: Vehicle) -> CoreResult<DriverProfile> {
        let now = Utc::now();
        let profile = match self.drivers.get_driver(user_id).await.map_err(CoreError::storage)? {
            Some(mut existing) => {
                existing.resubmit(vehicle, now)?;
                existing
            }
            None => DriverProfile::apply(user_id, vehicle, now),
        };

        self.drivers.save_driver(&profile).await.map_err(CoreError::storage)?;
        info!("Driver application submitted by {}", user_id);
        Ok(profile)
    }

    pub async fn review_application(
        &self,
        user_id: &str,
        approve: bool,
        admin_id: &str,
    ) -> CoreResult<DriverProfile> {
        let mut profile = self.get_driver(user_id).await?;
        profile.review(approve, admin_id, Utc::now())?;

        self.drivers.save_driver(&profile).await.map_err(CoreError::storage)?;
        info!(
            "Driver application of {} {} by {}",
            user_id,
            profile.status.as_str(),
            admin_id
        );
        Ok(profile)
    }

    pub async fn get_driver(&self, user_id: &str) -> CoreResult<DriverProfile> {
        self.drivers
            .get_driver(user_id)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("driver application for {}", user_id)))
    }

    pub async fn list_pending(&self) -> CoreResult<Vec<DriverProfile>> {
        self.drivers.list_pending_drivers().await.map_err(CoreError::storage)
    }

    /// Publishing rides is reserved for approved drivers.
    pub async fn ensure_approved(&self, user_id: &str) -> CoreResult<()> {
        match self.drivers.get_driver(user_id).await.map_err(CoreError::storage)? {
            Some(profile) if profile.is_approved() => Ok(()),
            Some(profile) => Err(CoreError::Unauthorized(format!(
                "driver application is {}",
                profile.status.as_str()
            ))),
            None => Err(CoreError::Unauthorized(
                "user has not applied to drive".to_string(),
            )),
        }
    }
}
