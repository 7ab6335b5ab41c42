use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::warn;

use crate::state::AppState;

/// Fixed window per client IP. Skipped without Redis or a peer address,
/// and fails open when Redis errors.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (Some(redis), Some(ConnectInfo(addr))) = (
        state.redis.as_ref(),
        req.extensions().get::<ConnectInfo<SocketAddr>>().copied(),
    ) else {
        return next.run(req).await;
    };

    let key = format!("ratelimit:{}", addr.ip());
    let limits = &state.rate_limit;
    match redis
        .check_rate_limit(&key, limits.requests_per_window, limits.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response(),
        Err(e) => {
            warn!("Rate limiter unavailable, letting request through: {}", e);
            next.run(req).await
        }
    }
}
