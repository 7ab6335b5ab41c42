use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::repository::{RepoResult, RideRepository};
use ridepool_core::{Coordinates, Location, Ride, RideSearchQuery, RideStatus, Vehicle};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

const RIDE_COLUMNS: &str = "id, driver_id, start_location, end_location, route, departure_time, \
     total_seats, available_seats, price_per_seat, status, vehicle, version, created_at, updated_at";

pub struct PgRideRepository {
    pool: PgPool,
}

impl PgRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RideRow {
    id: Uuid,
    driver_id: String,
    start_location: Json<Location>,
    end_location: Json<Location>,
    route: Json<Vec<Coordinates>>,
    departure_time: DateTime<Utc>,
    total_seats: i32,
    available_seats: i32,
    price_per_seat: i32,
    status: String,
    vehicle: Json<Vehicle>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RideRow> for Ride {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: RideRow) -> Result<Self, Self::Error> {
        Ok(Ride {
            id: row.id,
            driver_id: row.driver_id,
            start_location: row.start_location.0,
            end_location: row.end_location.0,
            route: row.route.0,
            departure_time: row.departure_time,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            price_per_seat: row.price_per_seat,
            status: row.status.parse::<RideStatus>()?,
            vehicle: row.vehicle.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_rides(rows: Vec<RideRow>) -> RepoResult<Vec<Ride>> {
    rows.into_iter().map(Ride::try_from).collect()
}

#[async_trait]
impl RideRepository for PgRideRepository {
    async fn insert_ride(&self, ride: &Ride) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rides (id, driver_id, start_location, end_location, route, departure_time,
                               total_seats, available_seats, price_per_seat, status, vehicle, version,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(ride.id)
        .bind(&ride.driver_id)
        .bind(Json(ride.start_location.clone()))
        .bind(Json(ride.end_location.clone()))
        .bind(Json(ride.route.clone()))
        .bind(ride.departure_time)
        .bind(ride.total_seats)
        .bind(ride.available_seats)
        .bind(ride.price_per_seat)
        .bind(ride.status.as_str())
        .bind(Json(ride.vehicle.clone()))
        .bind(ride.version)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> RepoResult<Option<Ride>> {
        let row: Option<RideRow> =
            sqlx::query_as(&format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Ride::try_from).transpose()
    }

    async fn swap_inventory(&self, ride: &Ride, expected_version: i64) -> RepoResult<bool> {
        // The version guard makes check-and-write a single statement.
        let result = sqlx::query(
            r#"
            UPDATE rides
            SET total_seats = $1, available_seats = $2, status = $3, version = $4, updated_at = $5
            WHERE id = $6 AND version = $7
            "#,
        )
        .bind(ride.total_seats)
        .bind(ride.available_seats)
        .bind(ride.status.as_str())
        .bind(ride.version)
        .bind(ride.updated_at)
        .bind(ride.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_details(&self, ride: &Ride) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE rides
            SET start_location = $1, end_location = $2, route = $3, departure_time = $4,
                price_per_seat = $5, vehicle = $6, updated_at = $7
            WHERE id = $8 AND status IN ('PUBLISHED', 'FILLED')
            "#,
        )
        .bind(Json(ride.start_location.clone()))
        .bind(Json(ride.end_location.clone()))
        .bind(Json(ride.route.clone()))
        .bind(ride.departure_time)
        .bind(ride.price_per_seat)
        .bind(Json(ride.vehicle.clone()))
        .bind(ride.updated_at)
        .bind(ride.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn search_published(
        &self,
        query: &RideSearchQuery,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Ride>> {
        let rows: Vec<RideRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM rides
            WHERE status = 'PUBLISHED'
              AND departure_time >= $1
              AND available_seats >= $2
              AND start_location->>'name' ILIKE $3 ESCAPE '\'
              AND end_location->>'name' ILIKE $4 ESCAPE '\'
              AND ($5::date IS NULL OR (departure_time AT TIME ZONE 'UTC')::date = $5)
            ORDER BY departure_time ASC
            "#,
            RIDE_COLUMNS
        ))
        .bind(now)
        .bind(query.min_seats())
        .bind(contains_pattern(&query.from))
        .bind(contains_pattern(&query.to))
        .bind(query.date)
        .fetch_all(&self.pool)
        .await?;

        into_rides(rows)
    }

    async fn list_rides_for_driver(&self, driver_id: &str) -> RepoResult<Vec<Ride>> {
        let rows: Vec<RideRow> = sqlx::query_as(&format!(
            "SELECT {} FROM rides WHERE driver_id = $1 ORDER BY created_at DESC",
            RIDE_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        into_rides(rows)
    }
}

/// Substring match for ILIKE with the term's own wildcards taken literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("  Pune "), "%Pune%");
        assert_eq!(contains_pattern("%"), r"%\%%");
        assert_eq!(contains_pattern("Sector_5"), r"%Sector\_5%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }
}
