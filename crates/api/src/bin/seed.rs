//! Load the sample vendor directory into the configured store.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procura_api::config::StoreBackend;
use procura_api::seed::seed_vendors;
use procura_db::PgStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procura_api=info,procura_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = match StoreBackend::from_env().expect("Invalid store configuration") {
        StoreBackend::Postgres { database_url } => database_url,
        StoreBackend::Memory => {
            tracing::warn!("STORE_BACKEND=memory keeps nothing after exit; nothing to seed");
            return;
        }
    };

    let pool = procura_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    procura_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let report = seed_vendors(Arc::new(PgStore::new(pool)))
        .await
        .expect("Vendor seeding failed");
    tracing::info!(created = report.created, existing = report.existing, "Seed complete");
}
