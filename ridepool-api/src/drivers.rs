use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use ridepool_core::{DriverProfile, Vehicle};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::{Claims, Role};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DriverApplicationRequest {
    pub vehicle: Vehicle,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/drivers/application", get(my_application).post(submit_application))
        .route("/v1/admin/drivers/pending", get(pending_applications))
        .route("/v1/admin/drivers/{user_id}/review", post(review_application))
}

async fn submit_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DriverApplicationRequest>,
) -> Result<(StatusCode, Json<DriverProfile>), AppError> {
    let profile = state.drivers.submit_application(&claims.sub, req.vehicle).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn my_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DriverProfile>, AppError> {
    Ok(Json(state.drivers.get_driver(&claims.sub).await?))
}

async fn pending_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DriverProfile>>, AppError> {
    claims.require_role(Role::Admin)?;
    Ok(Json(state.drivers.list_pending().await?))
}

async fn review_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    claims.require_role(Role::Admin)?;
    let profile = state
        .drivers
        .review_application(&user_id, req.approve, &claims.sub)
        .await?;
    Ok(Json(profile))
}
