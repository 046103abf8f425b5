// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use exam_portal::{
    cache::{Cache, MemoryCache},
    config::Config,
    payments::{CashfreeGateway, PaymentGateway},
    provisioning::{ProvisioningEngine, ProvisioningSettings},
    routes,
    session::{SessionEngine, SessionSettings},
    state::AppState,
    store::{ExamStore, PgStore},
    utils::jwt::TokenCodec,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired cache entries (mostly staged orders) are swept.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "exam-portal.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(config.store_timeout)
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let memory_cache = Arc::new(MemoryCache::new());
    spawn_cache_sweeper(memory_cache.clone());

    let store: Arc<dyn ExamStore> = Arc::new(PgStore::new(pool));
    let cache: Arc<dyn Cache> = memory_cache;
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        CashfreeGateway::new(&config.payment, config.store_timeout)
            .expect("Failed to build payment gateway client"),
    );

    let session = SessionEngine::new(
        store.clone(),
        cache.clone(),
        TokenCodec::new(&config.jwt_secret),
        SessionSettings::from(&config),
    );
    let provisioning =
        ProvisioningEngine::new(store, cache, gateway, ProvisioningSettings::from(&config));

    let state = AppState {
        session: Arc::new(session),
        provisioning: Arc::new(provisioning),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

fn spawn_cache_sweeper(cache: Arc<MemoryCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                tracing::debug!("Purged {} expired cache entries", purged);
            }
        }
    });
}
