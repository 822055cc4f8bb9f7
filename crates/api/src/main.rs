use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procura_api::background;
use procura_api::config::{PipelineConfig, ServerConfig, StoreBackend};
use procura_api::router::build_app_router;
use procura_api::state::{build_extractor, AppState};
use procura_db::{MemoryStore, PgStore, SharedStore};
use procura_events::{EmailConfig, EmailDelivery, EventBus, LogChannel, OutboxRelay, SharedChannel};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procura_api=debug,procura_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("Invalid server configuration");
    let pipeline = PipelineConfig::from_env().expect("Invalid pipeline configuration");
    let backend = StoreBackend::from_env().expect("Invalid store configuration");

    // --- Store ---
    let store: SharedStore = match backend {
        StoreBackend::Postgres { database_url } => {
            let pool = procura_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            procura_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            procura_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; entities are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Notification channel ---
    let channel: SharedChannel = match EmailConfig::from_env() {
        Some(email) => {
            let delivery = EmailDelivery::new(email).expect("Invalid SMTP configuration");
            tracing::info!("SMTP delivery enabled");
            Arc::new(delivery)
        }
        None => {
            tracing::info!("SMTP_HOST not set, notifications are logged only");
            Arc::new(LogChannel)
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(procura_events::bus::log_events(event_bus.subscribe()));

    let extractor = build_extractor(&pipeline);
    tracing::info!(
        extractor = ?pipeline.extractor,
        auto_parse = pipeline.auto_parse,
        "Pipeline configured"
    );

    let state = AppState::new(
        config.clone(),
        &pipeline,
        store.clone(),
        Arc::clone(&event_bus),
        extractor,
        channel.clone(),
    );

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let relay = OutboxRelay::new(store, channel, pipeline.outbox_interval);
    let relay_cancel = cancel.clone();
    let relay_handle = tokio::spawn(async move { relay.run(relay_cancel).await });

    let poller_handle = tokio::spawn(background::mailbox_poller::run(
        state.intake.clone(),
        pipeline.email_check_interval,
        cancel.clone(),
    ));

    let sweeper_handle = tokio::spawn(background::deadline_sweeper::run(
        state.lifecycle.clone(),
        pipeline.deadline_sweep_interval,
        cancel.clone(),
    ));

    let app = build_app_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST/PORT");
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Shutdown ---
    tracing::info!("Server stopped accepting connections, stopping background tasks");
    cancel.cancel();

    let grace = config.shutdown_timeout();
    let _ = tokio::time::timeout(grace, relay_handle).await;
    let _ = tokio::time::timeout(grace, poller_handle).await;
    let _ = tokio::time::timeout(grace, sweeper_handle).await;
    tracing::info!("Background tasks stopped");

    // The log task ends once the last bus handle is gone.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), event_log_handle).await;

    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
