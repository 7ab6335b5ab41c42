use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use ridepool_core::{Booking, NewRide, Ride, RideDetailsUpdate, RideSearchQuery};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResizeRideRequest {
    pub total_seats: i32,
}

/// Reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/v1/rides/search", get(search_rides))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/rides", post(create_ride))
        .route("/v1/rides/mine", get(my_rides))
        .route("/v1/rides/{id}", get(get_ride).patch(update_ride))
        .route("/v1/rides/{id}/seats", put(resize_ride))
        .route("/v1/rides/{id}/cancel", post(cancel_ride))
        .route("/v1/rides/{id}/complete", post(complete_ride))
        .route("/v1/rides/{id}/bookings", get(ride_bookings))
}

async fn search_rides(
    State(state): State<AppState>,
    Query(query): Query<RideSearchQuery>,
) -> Result<Json<Vec<Ride>>, AppError> {
    let rides = state.rides.search_published_rides(&query).await?;
    Ok(Json(rides))
}

async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewRide>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = state.rides.create_ride(&claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Ride>>, AppError> {
    Ok(Json(state.rides.list_rides_for_driver(&claims.sub).await?))
}

async fn get_ride(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.get_ride(id).await?))
}

async fn update_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<RideDetailsUpdate>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.update_ride_fields(id, &claims.sub, req).await?))
}

async fn resize_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResizeRideRequest>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.resize_ride(id, &claims.sub, req.total_seats).await?))
}

async fn cancel_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.cancel_ride(id, &claims.sub).await?))
}

async fn complete_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.complete_ride(id, &claims.sub).await?))
}

async fn ride_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_bookings_for_ride(id, &claims.sub).await?))
}
