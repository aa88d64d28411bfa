// End-to-end tests for the HTTP surface

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use exit_platform::server::{build_router, AppState};
use exit_platform::PlatformConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = PlatformConfig {
        database_path: dir.path().join("test.db"),
        data_room_dir: dir.path().join("rooms"),
        ..PlatformConfig::default()
    };
    let state = AppState::new(config).unwrap();
    (build_router(state), dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_valuation_then_matching_uses_session() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/valuation/calculate",
            "seller_a",
            json!({
                "financial_data": {
                    "annual_revenue": 10_000_000.0,
                    "ebitda": 2_000_000.0,
                    "total_assets": 5_000_000.0
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"], "valuation");
    assert_eq!(body["data"]["method"], "ebitda_multiple");
    assert_eq!(body["data"]["estimated_value"], 9_500_000.0);

    // Seller A's stored valuation (9.5M) replaces the zero in the profile
    let profile = json!({
        "business_profile": { "sector": "Technology", "location": "Bangalore", "valuation": 0.0 }
    });
    let (status, body) = send(
        &app,
        post_json("/api/matching/find-buyers", "seller_a", profile.clone()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["match_count"], 1);
    assert_eq!(body["data"]["matches"][0]["anonymized_id"], "BUYER_fund_001");
    assert_eq!(body["data"]["matches"][0]["match_score"], 1.0);
    assert!(body["data"]["matches"][0]["buyer"].get("display_name").is_none());
    assert_eq!(body["message"], "1 investors matched this week");

    // Another user has no valuation in session: 6/10 is not enough
    let (_, body) = send(
        &app,
        post_json("/api/matching/find-buyers", "seller_b", profile),
    )
    .await;
    assert_eq!(body["data"]["match_count"], 0);
}

#[tokio::test]
async fn test_invalid_method_is_rejected() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/valuation/calculate",
            "seller_a",
            json!({ "financial_data": { "annual_revenue": 1000.0 }, "method": "magic" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_METHOD");
}

#[tokio::test]
async fn test_missing_revenue_is_rejected() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/valuation/calculate",
            "seller_a",
            json!({ "financial_data": { "ebitda": 1000.0 } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_listing_wizard_steps() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/listing/step",
            "seller_a",
            json!({ "current_step": 0, "user_data": { "name": "Chai Point" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"], "exit_coach");
    assert!(body["message"].as_str().unwrap().starts_with("Step 1: "));
    assert_eq!(body["data"]["step"]["total_steps"], 5);
    assert_eq!(body["data"]["user_data"]["name"], "Chai Point");

    let (_, body) = send(
        &app,
        post_json("/api/listing/step", "seller_a", json!({ "current_step": 5 })),
    )
    .await;
    assert_eq!(body["message"], "Listing process completed!");
    assert_eq!(body["data"]["step"]["status"], "completed");
}

#[tokio::test]
async fn test_publish_and_fetch_listing() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/listing/publish",
            "seller_a",
            json!({
                "business_id": "biz 42",
                "listing_data": {
                    "asking_price": 12_000_000.0,
                    "assets_included": ["Inventory", "Brand"],
                    "transfer_timeline": "6 weeks"
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "published");
    let listing_id = body["listing_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get("/api/listing/biz%2042")).await;
    assert_eq!(status, StatusCode::OK);
    let listings = body.as_array().unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0]["id"], listing_id);
    assert_eq!(listings[0]["handover_type"], "Immediate");
    assert_eq!(listings[0]["views_count"], 0);
}

#[tokio::test]
async fn test_transfer_checklists() {
    let (app, _dir) = test_app();

    let (status, body) = send(&app, get("/api/transfer/checklist/partnership")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"], "transfer");
    assert_eq!(body["data"]["checklist"][0], "Partnership deed amendment");
    assert_eq!(body["data"]["estimated_timeline"], "4-6 weeks");

    let (_, body) = send(
        &app,
        post_json(
            "/api/transfer/start-transfer",
            "seller_a",
            json!({ "business_type": "llp" }),
        ),
    )
    .await;
    assert_eq!(body["data"]["checklist"], json!([]));
    assert_eq!(
        body["data"]["documents_required"],
        json!(["Sale agreement", "Identity proof"])
    );
}

#[tokio::test]
async fn test_document_upload_and_list() {
    let (app, _dir) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/documents/upload?business_id=biz_1&filename=balance%20sheet.pdf")
        .body(Body::from("%PDF-1.7"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["document"]["filename"], "balance sheet.pdf");
    assert_eq!(body["document"]["size"], 8);
    assert_eq!(body["list_url"], "/api/documents/list/biz_1");

    let (status, body) = send(&app, get("/api/documents/list/biz_1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);

    let request = Request::builder()
        .method("POST")
        .uri("/api/documents/upload?business_id=..&filename=x.txt")
        .body(Body::from("x"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_share_link() {
    let (app, _dir) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/api/documents/share",
            "seller_a",
            json!({ "recipient_id": "BUYER_fund_001" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipient"], "BUYER_fund_001");
    assert!(body["shareable_link"]
        .as_str()
        .unwrap()
        .starts_with("/api/documents/shared/"));
}

#[tokio::test]
async fn test_share_link_expiry_out_of_range() {
    let (app, _dir) = test_app();

    for hours in [0_i64, 1_000_000_000_000] {
        let (status, body) = send(
            &app,
            post_json(
                "/api/documents/share",
                "seller_a",
                json!({ "recipient_id": "b", "expiry_hours": hours }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, get("/api/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
