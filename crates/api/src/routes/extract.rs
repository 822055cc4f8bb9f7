use axum::routing::post;
use axum::Router;

use crate::handlers::extract;
use crate::state::AppState;

/// Routes mounted at `/extract`.
///
/// ```text
/// POST   /rfp       -> rfp
/// POST   /proposal  -> proposal
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rfp", post(extract::rfp))
        .route("/proposal", post(extract::proposal))
}
