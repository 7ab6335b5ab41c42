use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ride::Vehicle;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Pending,
    Approved,
    Rejected,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Pending => "PENDING",
            DriverStatus::Approved => "APPROVED",
            DriverStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for DriverStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DriverStatus::Pending),
            "APPROVED" => Ok(DriverStatus::Approved),
            "REJECTED" => Ok(DriverStatus::Rejected),
            other => Err(CoreError::Storage(format!("unknown driver status {}", other))),
        }
    }
}

/// A user's application to publish rides, reviewed by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub user_id: String,
    pub status: DriverStatus,
    pub vehicle: Vehicle,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl DriverProfile {
    pub fn apply(user_id: &str, vehicle: Vehicle, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            status: DriverStatus::Pending,
            vehicle,
            applied_at: now,
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    /// Only a rejected application may be sent again.
    pub fn resubmit(&mut self, vehicle: Vehicle, now: DateTime<Utc>) -> CoreResult<()> {
        match self.status {
            DriverStatus::Rejected => {
                self.status = DriverStatus::Pending;
                self.vehicle = vehicle;
                self.applied_at = now;
                self.reviewed_at = None;
                self.reviewed_by = None;
                Ok(())
            }
            status => Err(CoreError::InvalidState(format!(
                "driver application is already {}",
                status.as_str()
            ))),
        }
    }

    pub fn review(&mut self, approve: bool, admin_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != DriverStatus::Pending {
            return Err(CoreError::InvalidState(format!(
                "driver application is already {}",
                self.status.as_str()
            )));
        }
        self.status = if approve {
            DriverStatus::Approved
        } else {
            DriverStatus::Rejected
        };
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(admin_id.to_string());
        Ok(())
    }

    pub fn is_approved(&self) -> bool {
        self.status == DriverStatus::Approved
    }
}
