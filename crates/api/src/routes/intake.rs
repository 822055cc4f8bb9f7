use axum::routing::post;
use axum::Router;

use crate::handlers::intake;
use crate::state::AppState;

/// Routes mounted at `/intake`.
///
/// ```text
/// POST   /messages  -> push_message (queue an inbound message)
/// POST   /check     -> check (run an intake pass now)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(intake::push_message))
        .route("/check", post(intake::check))
}
