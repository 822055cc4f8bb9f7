//! Route definitions for the `/proposals` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::proposal;
use crate::state::AppState;

/// Routes mounted at `/proposals`.
///
/// ```text
/// GET    /             -> list (?rfp_id=&limit=&offset=)
/// GET    /{id}         -> get_by_id
/// DELETE /{id}         -> delete (soft)
/// POST   /{id}/parse   -> parse
/// POST   /{id}/accept  -> accept
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(proposal::list))
        .route("/{id}", get(proposal::get_by_id).delete(proposal::delete))
        .route("/{id}/parse", post(proposal::parse))
        .route("/{id}/accept", post(proposal::accept))
}
