use axum::{http::Method, middleware::from_fn_with_state, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod drivers;
pub mod error;
pub mod middleware;
pub mod rides;
pub mod state;

pub use state::{AppState, AuthConfig, Stores};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let authenticated = Router::new()
        .merge(rides::routes())
        .merge(bookings::routes())
        .merge(drivers::routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .merge(rides::public_routes())
        .merge(authenticated)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .with_state(state)
}
