//! Periodic intake pass over the inbound mailbox.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use procura_pipeline::IntakeBridge;

/// Run `check_for_new_proposals` every `interval` until `cancel` fires.
pub async fn run(intake: IntakeBridge, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Mailbox poller started");

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it so startup stays quiet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Mailbox poller stopping");
                break;
            }
            _ = ticker.tick() => {
                match intake.check_for_new_proposals().await {
                    Ok(report) if report.ingested > 0 || report.failed > 0 => {
                        tracing::info!(
                            ingested = report.ingested,
                            parsed = report.parsed,
                            duplicates = report.duplicates,
                            failed = report.failed,
                            "Mailbox poll: new proposals"
                        );
                    }
                    Ok(_) => tracing::debug!("Mailbox poll: nothing new"),
                    Err(e) => tracing::error!(error = %e, "Mailbox poll failed"),
                }
            }
        }
    }
}
