//! Route definitions for the `/vendors` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::vendor;
use crate::state::AppState;

/// Routes mounted at `/vendors`.
///
/// ```text
/// GET    /                   -> list (?include_inactive=&limit=&offset=)
/// POST   /                   -> create
/// GET    /{id}               -> get_by_id
/// PUT    /{id}               -> update
/// DELETE /{id}               -> delete (deactivates when referenced)
/// POST   /{id}/toggle-active -> toggle_active
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(vendor::list).post(vendor::create))
        .route(
            "/{id}",
            get(vendor::get_by_id)
                .put(vendor::update)
                .delete(vendor::delete),
        )
        .route("/{id}/toggle-active", post(vendor::toggle_active))
}
