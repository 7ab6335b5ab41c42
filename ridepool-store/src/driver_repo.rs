use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::repository::{DriverRepository, RepoResult};
use ridepool_core::{DriverProfile, DriverStatus, Vehicle};
use sqlx::types::Json;
use sqlx::PgPool;

pub struct PgDriverRepository {
    pool: PgPool,
}

impl PgDriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    user_id: String,
    status: String,
    vehicle: Json<Vehicle>,
    applied_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<String>,
}

impl TryFrom<DriverRow> for DriverProfile {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: DriverRow) -> Result<Self, Self::Error> {
        Ok(DriverProfile {
            user_id: row.user_id,
            status: row.status.parse::<DriverStatus>()?,
            vehicle: row.vehicle.0,
            applied_at: row.applied_at,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by,
        })
    }
}

#[async_trait]
impl DriverRepository for PgDriverRepository {
    async fn get_driver(&self, user_id: &str) -> RepoResult<Option<DriverProfile>> {
        let row: Option<DriverRow> = sqlx::query_as(
            "SELECT user_id, status, vehicle, applied_at, reviewed_at, reviewed_by FROM drivers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DriverProfile::try_from).transpose()
    }

    async fn save_driver(&self, profile: &DriverProfile) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO drivers (user_id, status, vehicle, applied_at, reviewed_at, reviewed_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET status = EXCLUDED.status, vehicle = EXCLUDED.vehicle, applied_at = EXCLUDED.applied_at,
                reviewed_at = EXCLUDED.reviewed_at, reviewed_by = EXCLUDED.reviewed_by
            "#,
        )
        .bind(&profile.user_id)
        .bind(profile.status.as_str())
        .bind(Json(profile.vehicle.clone()))
        .bind(profile.applied_at)
        .bind(profile.reviewed_at)
        .bind(&profile.reviewed_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_pending_drivers(&self) -> RepoResult<Vec<DriverProfile>> {
        let rows: Vec<DriverRow> = sqlx::query_as(
            "SELECT user_id, status, vehicle, applied_at, reviewed_at, reviewed_by FROM drivers WHERE status = 'PENDING' ORDER BY applied_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DriverProfile::try_from).collect()
    }
}
