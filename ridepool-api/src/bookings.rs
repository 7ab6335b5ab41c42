use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use ridepool_core::{Booking, CoreError};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
    pub seats: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub seats: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/mine", get(my_bookings))
        .route("/v1/bookings/{id}", get(get_booking).patch(update_booking))
        .route("/v1/bookings/{id}/accept", post(accept_booking))
        .route("/v1/bookings/{id}/reject", post(reject_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .bookings
        .create_booking(req.ride_id, &claims.sub, req.seats)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_bookings_for_passenger(&claims.sub).await?))
}

/// Visible to the passenger and to the ride's driver.
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.get_booking(id).await?;
    if !booking.is_owned_by(&claims.sub) {
        let ride = state.rides.get_ride(booking.ride_id).await?;
        if !ride.is_owned_by(&claims.sub) {
            return Err(CoreError::Unauthorized(format!("booking {} is not yours", id)).into());
        }
    }
    Ok(Json(booking))
}

async fn update_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.update_booking(id, &claims.sub, req.seats).await?))
}

async fn accept_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.accept_booking(id, &claims.sub).await?))
}

async fn reject_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.reject_booking(id, &claims.sub).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel_booking(id, &claims.sub).await?))
}
