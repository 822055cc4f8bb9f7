//! `/api/v1/vendors` endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn create_normalizes_and_returns_201() {
    let app = common::build_test_app();
    let (status, json) = app
        .post(
            "/api/v1/vendors",
            json!({ "name": "  Acme Supplies ", "email": "Sales@Acme.COM", "website": "" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["name"], "Acme Supplies");
    assert_eq!(json["data"]["email"], "sales@acme.com");
    assert_eq!(json["data"]["active"], true);
    assert!(json["data"]["website"].is_null());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = common::build_test_app();
    app.vendor("Acme", "sales@acme.com").await;

    let (status, json) = app
        .post(
            "/api/v1/vendors",
            json!({ "name": "Acme Again", "email": "SALES@acme.com" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let app = common::build_test_app();
    let (status, json) = app
        .post("/api/v1/vendors", json!({ "name": "Acme", "email": "not-an-email" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn toggle_hides_vendor_from_default_listing() {
    let app = common::build_test_app();
    let id = app.vendor("Acme", "sales@acme.com").await;
    app.vendor("Globex", "bids@globex.com").await;

    let (status, json) = app
        .post_empty(&format!("/api/v1/vendors/{id}/toggle-active"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["active"], false);

    let (_, active) = app.get("/api/v1/vendors").await;
    assert_eq!(active["data"].as_array().unwrap().len(), 1);

    let (_, all) = app.get("/api/v1/vendors?include_inactive=true").await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let app = common::build_test_app();
    let id = app.vendor("Acme", "sales@acme.com").await;

    let (status, json) = app
        .put(&format!("/api/v1/vendors/{id}"), json!({ "city": "Berlin" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["city"], "Berlin");
    assert_eq!(json["data"]["email"], "sales@acme.com");
}

#[tokio::test]
async fn unreferenced_vendor_is_deleted() {
    let app = common::build_test_app();
    let id = app.vendor("Acme", "sales@acme.com").await;

    let (status, json) = app.delete(&format!("/api/v1/vendors/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "deleted");

    let (status, json) = app.get(&format!("/api/v1/vendors/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn vendor_on_a_dispatched_rfp_is_deactivated_instead() {
    let app = common::build_test_app();
    let id = app.vendor("Acme", "sales@acme.com").await;
    let rfp_id = app.price_and_delivery_rfp().await;
    let (status, _) = app
        .post(
            &format!("/api/v1/rfps/{rfp_id}/dispatch"),
            json!({ "vendor_ids": [id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.delete(&format!("/api/v1/vendors/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "deactivated");
    assert_eq!(json["data"]["vendor"]["active"], false);
}
