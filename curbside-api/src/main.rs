use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use curbside_api::{app, worker, AppState, AuthConfig};
use curbside_booking::{BookingService, ExpirySweeper};
use curbside_core::{BroadcastNotifier, ChangeNotifier, FanoutNotifier, InMemorySpotStore, SpotStore};
use curbside_store::app_config::Config;
use curbside_store::{DbClient, KafkaChangeNotifier, PgSpotStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curbside_api=debug,curbside_booking=info,curbside_store=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Curbside API on port {}", config.server.port);

    let seed = config.seed().context("Invalid seed_spots")?;

    let store: Arc<dyn SpotStore> = match &config.database {
        Some(db_config) => {
            let db = DbClient::new(db_config).await.context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let store = PgSpotStore::new(db.pool.clone());
            store.seed(&seed).await.context("Failed to seed parking spots")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("No database configured, spots are kept in memory");
            let store = InMemorySpotStore::new();
            store.seed(seed).await;
            Arc::new(store)
        }
    };

    // SSE observers plus, optionally, the Kafka change feed
    let changes = BroadcastNotifier::new(config.notifications.channel_capacity);
    let mut fanout = FanoutNotifier::new().with(Arc::new(changes.clone()));
    if let Some(kafka) = &config.kafka {
        let kafka_notifier = KafkaChangeNotifier::new(&kafka.brokers, kafka.topic.clone())
            .context("Failed to create Kafka producer")?;
        fanout = fanout.with(Arc::new(kafka_notifier));
    }
    let notifier: Arc<dyn ChangeNotifier> = Arc::new(fanout);

    let bookings = Arc::new(BookingService::new(store.clone(), notifier.clone()));
    let sweeper = Arc::new(ExpirySweeper::new(store, notifier).with_interval(config.sweeper.interval()));
    worker::start_expiry_worker(sweeper.clone());

    let app_state = AppState {
        bookings,
        sweeper,
        changes,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            audience: config.auth.audience.clone(),
        },
        cron_secret: config.cron.as_ref().map(|c| c.secret.clone()),
        allowed_origin: config.server.allowed_origin.clone(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;

    Ok(())
}
