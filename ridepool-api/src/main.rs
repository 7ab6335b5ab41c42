use anyhow::Context;
use ridepool_api::{app, AppState, AuthConfig, Stores};
use ridepool_booking::{LogSink, NotificationDispatcher};
use ridepool_core::notify::NotificationSink;
use ridepool_store::app_config::Config;
use ridepool_store::{
    DbClient, EventProducer, PgBookingRepository, PgDriverRepository, PgRideRepository, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ridepool_api=debug,ridepool_booking=debug,ridepool_inventory=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Ridepool API on port {}", config.server.port);

    let stores = match &config.database {
        Some(db) => {
            let client = DbClient::new(&db.url, db.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            client.migrate().await.context("Failed to run migrations")?;
            Stores {
                rides: Arc::new(PgRideRepository::new(client.pool.clone())),
                bookings: Arc::new(PgBookingRepository::new(client.pool.clone())),
                drivers: Arc::new(PgDriverRepository::new(client.pool.clone())),
            }
        }
        None => {
            tracing::warn!("No database configured, rides and bookings are kept in memory");
            Stores::in_memory()
        }
    };

    let sink: Arc<dyn NotificationSink> = match &config.kafka {
        Some(kafka) => Arc::new(
            EventProducer::new(&kafka.brokers, &config.notifications.topic)
                .context("Failed to create Kafka producer")?,
        ),
        None => {
            tracing::warn!("No Kafka configured, notifications are only logged");
            Arc::new(LogSink)
        }
    };
    let (notifier, _worker) = NotificationDispatcher::spawn(sink, config.notifications.queue_capacity);

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?,
        )),
        None => None,
    };

    let app_state = AppState::new(
        stores,
        notifier,
        config.inventory.max_cas_attempts,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        redis,
        config.rate_limit.clone(),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
