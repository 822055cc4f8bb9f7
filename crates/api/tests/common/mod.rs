//! Shared harness for API integration tests.
//!
//! Builds the production router over an in-memory store and a recording
//! notification channel, so every request runs through the same middleware
//! stack as `main.rs`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use procura_api::config::{PipelineConfig, ServerConfig};
use procura_api::router::build_app_router;
use procura_api::state::AppState;
use procura_db::MemoryStore;
use procura_events::{EventBus, RecordingChannel};
use procura_pipeline::{RuleCapability, SharedCapability, StructuredExtractor};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:4200".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub channel: Arc<RecordingChannel>,
}

/// The app with the rule-based extractor and intake auto-parse on.
pub fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(RuleCapability::new()))
}

pub fn build_test_app_with(capability: SharedCapability) -> TestApp {
    let config = test_config();
    let pipeline = PipelineConfig::default();
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(RecordingChannel::new());

    let state = AppState::new(
        config.clone(),
        &pipeline,
        store.clone(),
        Arc::new(EventBus::default()),
        StructuredExtractor::new(capability),
        channel.clone(),
    );

    TestApp {
        router: build_app_router(state, &config),
        store,
        channel,
    }
}

impl TestApp {
    pub async fn raw(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and return the status with the parsed JSON body
    /// (`Value::Null` when the body is empty).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.raw(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, None).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    /// Create a vendor and return its id.
    pub async fn vendor(&self, name: &str, email: &str) -> i64 {
        let (status, json) = self
            .post("/api/v1/vendors", json!({ "name": name, "email": email }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "vendor create failed: {json}");
        json["data"]["id"].as_i64().unwrap()
    }

    /// Create a DRAFT RFP scored on price (weight 2) and delivery (weight 1).
    pub async fn price_and_delivery_rfp(&self) -> i64 {
        let (status, json) = self
            .post(
                "/api/v1/rfps",
                json!({
                    "title": "Laptops",
                    "description": "50 business laptops",
                    "requirements": {
                        "criteria": [
                            { "criterion": "price", "weight": 2.0, "measure": { "kind": "price" } },
                            { "criterion": "delivery", "weight": 1.0, "measure": { "kind": "delivery_time" } }
                        ]
                    }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "rfp create failed: {json}");
        json["data"]["id"].as_i64().unwrap()
    }

    /// Queue a vendor reply quoting the RFP reference in its subject.
    pub async fn queue_reply(&self, rfp_id: i64, from: &str, message_id: &str, body: &str) {
        let (status, json) = self
            .post(
                "/api/v1/intake/messages",
                json!({
                    "message_id": message_id,
                    "from": from,
                    "subject": format!("Re: [RFP {rfp_id}] Request for Proposal"),
                    "body": body,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "queue failed: {json}");
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
