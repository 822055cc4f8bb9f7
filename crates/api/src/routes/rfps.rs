//! Route definitions for the `/rfps` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::rfp;
use crate::state::AppState;

/// Routes mounted at `/rfps`.
///
/// ```text
/// GET    /                -> list (?status=&limit=&offset=)
/// POST   /                -> create
/// POST   /from-text       -> create_from_text
/// GET    /{id}            -> get_by_id
/// PUT    /{id}            -> update (DRAFT only)
/// DELETE /{id}            -> delete (DRAFT only)
/// POST   /{id}/dispatch   -> dispatch
/// POST   /{id}/award      -> award
/// POST   /{id}/close      -> close
/// POST   /{id}/re-extract -> re_extract
/// POST   /{id}/evaluate   -> evaluate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rfp::list).post(rfp::create))
        .route("/from-text", post(rfp::create_from_text))
        .route(
            "/{id}",
            get(rfp::get_by_id).put(rfp::update).delete(rfp::delete),
        )
        .route("/{id}/dispatch", post(rfp::dispatch))
        .route("/{id}/award", post(rfp::award))
        .route("/{id}/close", post(rfp::close))
        .route("/{id}/re-extract", post(rfp::re_extract))
        .route("/{id}/evaluate", post(rfp::evaluate))
}
