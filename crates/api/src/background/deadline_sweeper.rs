//! Closes SENT RFPs once their response deadline has passed.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use procura_pipeline::Lifecycle;

/// Sweep overdue RFPs every `interval` until `cancel` fires.
pub async fn run(lifecycle: Lifecycle, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Deadline sweeper started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Deadline sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                match lifecycle.sweep_deadlines(Utc::now()).await {
                    Ok(closed) if !closed.is_empty() => {
                        let ids: Vec<_> = closed.iter().map(|r| r.id).collect();
                        tracing::info!(closed = closed.len(), rfp_ids = ?ids, "Deadline sweep closed RFPs");
                    }
                    Ok(_) => tracing::debug!("Deadline sweep: nothing overdue"),
                    Err(e) => tracing::error!(error = %e, "Deadline sweep failed"),
                }
            }
        }
    }
}
