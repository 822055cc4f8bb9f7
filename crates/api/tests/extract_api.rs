//! `/api/v1/extract` previews. Nothing they return is persisted.

mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn rfp_preview_returns_a_draft_without_storing_it() {
    let app = common::build_test_app();
    let (status, json) = app
        .post(
            "/api/v1/extract/rfp",
            json!({ "text": "Need 20 monitors. Budget of $4,000. Delivery within 2 weeks." }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["title"], "Need 20 monitors");
    assert_eq!(json["data"]["budget"], 4000.0);
    assert!(json["data"]["issues"].is_array());

    let (_, list) = app.get("/api/v1/rfps").await;
    assert_eq!(list["data"], json!([]));
}

#[tokio::test]
async fn proposal_preview_normalizes_units() {
    let app = common::build_test_app();
    let (status, json) = app
        .post(
            "/api/v1/extract/proposal",
            json!({
                "text": "Our total price is $68,500 for all items. We can deliver in 3 weeks. \
                         Warranty: 2 years on-site. Payment net 45."
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["price"], 68500.0);
    assert_eq!(json["data"]["currency"], "USD");
    assert_eq!(json["data"]["delivery_days"], 21.0);
    assert_eq!(json["data"]["warranty_months"], 24.0);
}

#[tokio::test]
async fn proposal_preview_uses_the_rfp_specification_keys() {
    let app = common::build_test_app();
    let (status, created) = app
        .post(
            "/api/v1/rfps",
            json!({
                "title": "Laptops",
                "description": "Developer laptops",
                "requirements": {
                    "criteria": [{
                        "criterion": "ram",
                        "measure": { "kind": "specification", "key": "RAM", "expected": "16GB" }
                    }]
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let rfp_id = created["data"]["id"].as_i64().unwrap();

    let (status, json) = app
        .post(
            "/api/v1/extract/proposal",
            json!({ "text": "Each unit ships with RAM: 32GB, SSD 1TB.", "rfp_id": rfp_id }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["specifications"]["RAM"], "32GB");
}

#[tokio::test]
async fn preview_against_a_missing_rfp_is_404() {
    let app = common::build_test_app();
    let (status, json) = app
        .post(
            "/api/v1/extract/proposal",
            json!({ "text": "Price $10", "rfp_id": 404 }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
