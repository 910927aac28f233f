use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use referral_api::{create_router, AppState};
use referral_db::{Database, DbConfig};
use referral_engine::{EngineConfig, ReferralEngine};

struct TestApp {
    app: Router,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp = TempDir::new().unwrap();
    let db = Database::new(DbConfig::new(temp.path().join("api.db")))
        .await
        .expect("database");
    let engine = ReferralEngine::new(db, EngineConfig::default());
    TestApp {
        app: create_router(AppState::new(engine)),
        _temp: temp,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Applies, gets approved and returns the marketer's user id.
    async fn approved_marketer(&self, user_id: &str) -> String {
        let (status, request) = self
            .send(
                "POST",
                "/v1/marketer-requests",
                Some(json!({ "user_id": user_id, "profile": profile() })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/v1/marketer-requests/{}/review", request["id"].as_str().unwrap());
        let (status, reviewed) = self
            .send(
                "POST",
                &uri,
                Some(json!({ "decision": "approve", "reviewed_by": "admin-1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reviewed["status"], "approved");
        user_id.to_string()
    }
}

fn profile() -> Value {
    json!({
        "full_name": "Reza Karimi",
        "phone_number": "+989351112233",
        "email": "reza@example.com",
        "experience_level": "advanced",
        "current_job": null,
        "interest_area": "technology",
        "motivation": "Tech channel with a large audience",
        "marketing_experience": "Two years of affiliate work",
        "instagram_handle": null,
        "telegram_handle": "@reza_tech"
    })
}

fn purchase(user_id: &str, amount: i64, code: Option<&str>) -> Value {
    json!({
        "user_id": user_id,
        "purchase_type": "course",
        "target_id": "course-42",
        "original_amount": amount,
        "referral_code": code,
    })
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let (status, body) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_save10_checkout_flow() {
    let app = setup_test_app().await;
    let marketer = app.approved_marketer("m-1").await;

    let (status, code) = app
        .send(
            "POST",
            &format!("/v1/marketers/{marketer}/codes"),
            Some(json!({
                "code": "SAVE10",
                "max_uses": 1,
                "discount_percentage": "10",
                "commission_percentage": "5"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(code["discount_percentage"], "10.00");

    let (status, preview) = app
        .send("GET", "/v1/codes/preview?code=SAVE10&amount=1000000", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["discount_amount"], 100_000);
    assert_eq!(preview["final_amount"], 900_000);

    let (status, first) = app
        .send("POST", "/v1/purchases", Some(purchase("buyer-1", 1_000_000, None)))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/v1/purchases/{}/finalize", first["id"].as_str().unwrap());
    let (status, outcome) = app.send("POST", &uri, Some(json!({ "code": "SAVE10" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["purchase"]["amount"], 900_000);
    assert_eq!(outcome["purchase"]["payment_status"], "completed");
    assert_eq!(outcome["commission"]["amount"], 45_000);
    assert_eq!(outcome["replayed"], false);

    // Repeating the callback replays the stored result
    let (status, replay) = app.send("POST", &uri, Some(json!({ "code": "SAVE10" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["replayed"], true);
    assert_eq!(replay["commission"]["id"], outcome["commission"]["id"]);

    let (status, second) = app
        .send("POST", "/v1/purchases", Some(purchase("buyer-2", 1_000_000, None)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/v1/purchases/{}/finalize", second["id"].as_str().unwrap());
    let (status, err) = app.send("POST", &uri, Some(json!({ "code": "SAVE10" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["code"], "USAGE_LIMIT_REACHED");

    let (status, preview) = app
        .send("GET", "/v1/codes/preview?code=SAVE10&amount=1000000", None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(preview["code"], "USAGE_LIMIT_REACHED");

    let (status, listing) = app
        .send("GET", &format!("/v1/marketers/{marketer}/commissions"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["commissions"].as_array().unwrap().len(), 1);
    assert_eq!(listing["totals"]["pending"], 45_000);
    assert_eq!(listing["totals"]["total"], 45_000);
}

#[tokio::test]
async fn test_commission_payout_and_summary() {
    let app = setup_test_app().await;
    let marketer = app.approved_marketer("m-2").await;
    app.send(
        "POST",
        &format!("/v1/marketers/{marketer}/codes"),
        Some(json!({ "code": "PAYME", "commission_percentage": "10" })),
    )
    .await;

    let (_, purchase) = app
        .send("POST", "/v1/purchases", Some(purchase("buyer", 200_000, Some("PAYME"))))
        .await;
    let uri = format!("/v1/purchases/{}/finalize", purchase["id"].as_str().unwrap());
    let (_, outcome) = app.send("POST", &uri, Some(json!({}))).await;
    let commission_id = outcome["commission"]["id"].as_str().unwrap().to_string();

    let (status, total) = app.send("GET", "/v1/commissions/pending-total", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(total["pending_total"].as_i64().unwrap() > 0);

    let (status, paid) = app
        .send("POST", &format!("/v1/commissions/{commission_id}/pay"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");

    let (status, err) = app
        .send(
            "POST",
            &format!("/v1/commissions/{commission_id}/cancel"),
            Some(json!({ "reason": "too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "INVALID_TRANSITION");

    let (status, summary) = app
        .send("GET", &format!("/v1/marketers/{marketer}/summary"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["code_count"], 1);
    assert_eq!(summary["total_uses"], 1);
    assert_eq!(summary["totals"]["paid"], summary["totals"]["total"]);

    let (_, paid_rows) = app.send("GET", "/v1/commissions?status=paid", None).await;
    assert_eq!(paid_rows.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_responses() {
    let app = setup_test_app().await;

    let (status, err) = app
        .send("GET", "/v1/codes/preview?code=NOPE&amount=1000", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "CODE_NOT_FOUND");

    let (status, err) = app
        .send("GET", "/v1/codes/preview?code=BAD-CODE&amount=1000", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "VALIDATION_FAILED");

    let (status, err) = app.send("GET", "/v1/codes/preview?code=X", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "INVALID_REQUEST");

    let (status, err) = app
        .send("POST", "/v1/marketers/stranger/codes", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["code"], "NOT_A_MARKETER");

    let (status, err) = app.send("GET", "/v1/purchases/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "PURCHASE_NOT_FOUND");

    let (status, err) = app
        .send("PUT", "/v1/settings", Some(json!({ "default_discount_percentage": "150" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_marketer_request_lifecycle() {
    let app = setup_test_app().await;

    let (status, latest) = app.send("GET", "/v1/users/u-9/marketer-request", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(latest.is_null());

    let body = json!({ "user_id": "u-9", "profile": profile() });
    let (status, request) = app
        .send("POST", "/v1/marketer-requests", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");

    let (status, err) = app
        .send("POST", "/v1/marketer-requests", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "DUPLICATE_APPLICATION");

    let (_, queue) = app
        .send("GET", "/v1/marketer-requests?status=pending", None)
        .await;
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let id = request["id"].as_str().unwrap();
    let (status, rejected) = app
        .send(
            "POST",
            &format!("/v1/marketer-requests/{id}/review"),
            Some(json!({ "decision": "reject", "admin_notes": "no audience", "reviewed_by": "admin-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["admin_notes"], "no audience");

    let (status, _) = app.send("POST", "/v1/marketer-requests", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_settings_and_code_admin() {
    let app = setup_test_app().await;
    let marketer = app.approved_marketer("m-3").await;

    let (status, settings) = app
        .send("PUT", "/v1/settings", Some(json!({ "default_discount_percentage": "12.5" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["default_discount_percentage"], "12.50");

    let (_, code) = app
        .send("POST", &format!("/v1/marketers/{marketer}/codes"), Some(json!({})))
        .await;
    assert_eq!(code["discount_percentage"], "12.50");
    assert_eq!(code["code"].as_str().unwrap().len(), 8);
    let id = code["id"].as_str().unwrap().to_string();

    let (status, updated) = app
        .send(
            "PATCH",
            &format!("/v1/codes/{id}"),
            Some(json!({ "is_active": false, "discount_percentage": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);
    assert!(updated["discount_percentage"].is_null());

    let (_, active) = app.send("GET", "/v1/codes?is_active=true", None).await;
    assert!(active.as_array().unwrap().is_empty());

    let (status, _) = app.send("DELETE", &format!("/v1/codes/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &format!("/v1/codes/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_marketer_code_edits_are_owner_scoped() {
    let app = setup_test_app().await;
    let owner = app.approved_marketer("m-4").await;
    let rival = app.approved_marketer("m-5").await;

    let (_, code) = app
        .send(
            "POST",
            &format!("/v1/marketers/{owner}/codes"),
            Some(json!({ "code": "OWNED", "discount_percentage": "50" })),
        )
        .await;
    let id = code["id"].as_str().unwrap().to_string();

    let (status, err) = app
        .send(
            "PATCH",
            &format!("/v1/marketers/{rival}/codes/{id}"),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "CODE_NOT_FOUND");
    let (status, _) = app
        .send("DELETE", &format!("/v1/marketers/{rival}/codes/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, paused) = app
        .send(
            "PATCH",
            &format!("/v1/marketers/{owner}/codes/{id}"),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paused["is_active"], false);

    // An open purchase priced under the code blocks deletion
    app.send(
        "PATCH",
        &format!("/v1/marketers/{owner}/codes/{id}"),
        Some(json!({ "is_active": true })),
    )
    .await;
    let (status, _) = app
        .send("POST", "/v1/purchases", Some(purchase("buyer", 100_000, Some("OWNED"))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = app
        .send("DELETE", &format!("/v1/marketers/{owner}/codes/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "CODE_IN_USE");
}
