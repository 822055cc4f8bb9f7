pub mod extract;
pub mod health;
pub mod intake;
pub mod proposals;
pub mod rfps;
pub mod vendors;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /vendors                        list, create
/// /vendors/{id}                   get, update, delete
/// /vendors/{id}/toggle-active     flip the active flag
///
/// /rfps                           list, create
/// /rfps/from-text                 create from natural language
/// /rfps/{id}                      get, update, delete
/// /rfps/{id}/dispatch             send to vendors
/// /rfps/{id}/award                accept a vendor's proposal
/// /rfps/{id}/close                stop taking proposals
/// /rfps/{id}/re-extract           re-run extraction on the source text
/// /rfps/{id}/evaluate             score and rank proposals
///
/// /proposals                      list (?rfp_id=)
/// /proposals/{id}                 get, delete
/// /proposals/{id}/parse           extract fields
/// /proposals/{id}/accept          accept and award
///
/// /intake/messages                queue an inbound message
/// /intake/check                   ingest queued messages
///
/// /extract/rfp                    preview RFP extraction
/// /extract/proposal               preview proposal extraction
///
/// /notifications                  outbox rows, newest first
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/vendors", vendors::router())
        .nest("/rfps", rfps::router())
        .nest("/proposals", proposals::router())
        .nest("/intake", intake::router())
        .nest("/extract", extract::router())
        .route("/notifications", get(handlers::notification::list))
}
