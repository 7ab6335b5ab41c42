use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::repository::{BookingRepository, RepoResult};
use ridepool_core::{Booking, BookingStatus};
use sqlx::PgPool;
use uuid::Uuid;

const BOOKING_COLUMNS: &str =
    "id, ride_id, passenger_id, seats_requested, status, created_at, updated_at";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    passenger_id: String,
    seats_requested: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            seats_requested: row.seats_requested,
            status: row.status.parse::<BookingStatus>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> RepoResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<bool> {
        // Arbitrated by bookings_one_active_per_passenger; a primary key clash still errors
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (id, ride_id, passenger_id, seats_requested, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (ride_id, passenger_id) WHERE status IN ('PENDING', 'ACCEPTED') DO NOTHING
            "#,
        )
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(&booking.passenger_id)
        .bind(booking.seats_requested)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> RepoResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE ride_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn list_bookings_for_passenger(&self, passenger_id: &str) -> RepoResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE passenger_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn transition_status(
        &self,
        current: &Booking,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4 AND seats_requested = $5
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(to.as_str())
        .bind(now)
        .bind(current.id)
        .bind(current.status.as_str())
        .bind(current.seats_requested)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn update_seats(
        &self,
        current: &Booking,
        to_seats: i32,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings SET seats_requested = $1, updated_at = $2
            WHERE id = $3 AND status = $4 AND seats_requested = $5
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(to_seats)
        .bind(now)
        .bind(current.id)
        .bind(current.status.as_str())
        .bind(current.seats_requested)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }
}
