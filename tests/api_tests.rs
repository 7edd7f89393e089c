use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use cnecbiz::{
    config::Config,
    create_app,
    entities::faqs,
    region::{Region, RegionalDatabases},
    AppState,
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app_with(dbs: RegionalDatabases) -> Router {
    create_app(AppState::new(Config::default(), dbs))
}

fn app() -> Router {
    app_with(RegionalDatabases::default())
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"Service is healthy");
}

#[tokio::test]
async fn test_openapi_lists_function_endpoints() {
    let request = Request::builder().uri("/api-doc/openapi.json").body(Body::empty()).unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    let paths = json["paths"].as_object().unwrap();
    assert!(paths.contains_key("/functions/check-unpaid-points"));
    assert!(paths.contains_key("/admin/finance/revenue/import"));
    assert!(paths.contains_key("/withdrawals/{id}/approve"));
    assert!(paths.contains_key("/withdrawals/{id}"));

    let schemas = &json["components"]["schemas"];
    assert_eq!(schemas["WithdrawalRequest"]["properties"]["created_at"]["format"], "date-time");
    assert!(schemas["WithdrawalView"].is_object());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_check_unpaid_points_rejects_unknown_action() {
    let (status, json) = send(app(), post_json("/functions/check-unpaid-points", json!({"action": "refund"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Invalid action");
}

#[tokio::test]
async fn test_check_unpaid_points_without_databases_reports_nothing() {
    let (status, json) = send(app(), post_json("/functions/check-unpaid-points", json!({"action": "get_unpaid"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["count"], 0);
    assert_eq!(json["data"]["unpaid_items"], json!([]));
}

#[tokio::test]
async fn test_award_bonus_requires_parameters() {
    let (status, json) = send(app(), post_json("/functions/award-bonus-points", json!({"campaign_id": Uuid::new_v4()}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "필수 파라미터가 누락되었습니다.");
}

#[tokio::test]
async fn test_malformed_json_body_uses_error_envelope() {
    let body = json!({"campaign_id": "not-a-uuid", "creator_id": Uuid::new_v4(), "base_amount": 1000});
    let (status, json) = send(app(), post_json("/functions/award-bonus-points", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unparseable_json_uses_error_envelope() {
    let request = Request::builder()
        .method("POST")
        .uri("/functions/create-campaign")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"campaign\": "))
        .unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_invalid_path_id_uses_error_envelope() {
    let request = Request::builder()
        .method("DELETE")
        .uri("/cms/faqs/not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_invalid_query_uses_error_envelope() {
    let dbs = RegionalDatabases::from_connections([(Region::Biz, empty_db())]);
    let request = Request::builder()
        .uri("/cms/faqs?include_inactive=maybe")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app_with(dbs), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_create_campaign_requires_title() {
    let body = json!({
        "campaign": {"title": "  "},
        "regions": ["korea"]
    });
    let (status, json) = send(app(), post_json("/functions/create-campaign", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "캠페인 제목이 필요합니다.");
}

#[tokio::test]
async fn test_update_campaign_status_without_region_database() {
    let body = json!({
        "campaignId": Uuid::new_v4(),
        "region": "japan",
        "newStatus": "active"
    });
    let (status, json) = send(app(), post_json("/functions/update-campaign-status", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("japan 리전의 Supabase 설정이 없습니다"));
}

#[tokio::test]
async fn test_update_campaign_status_rejects_unknown_status() {
    let body = json!({
        "campaignId": Uuid::new_v4(),
        "region": "korea",
        "newStatus": "archived"
    });
    let (status, json) = send(app(), post_json("/functions/update-campaign-status", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "유효하지 않은 상태값입니다.");
}

#[tokio::test]
async fn test_update_company_profile_requires_user_id() {
    let dbs = RegionalDatabases::from_connections([(Region::Korea, empty_db())]);
    let body = json!({"companyName": "씨넥", "ceoName": "홍길동"});
    let (status, json) = send(app_with(dbs), post_json("/functions/update-company-profile", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "사용자 ID가 필요합니다.");
}

#[tokio::test]
async fn test_fetch_youtube_data_requires_api_key() {
    let body = json!({"channel_url": "https://www.youtube.com/@cnec"});
    let (status, json) = send(app(), post_json("/functions/fetch-youtube-data", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "YouTube API key is required");
}

#[tokio::test]
async fn test_fetch_youtube_data_rejects_non_channel_url() {
    let body = json!({
        "channel_url": "https://example.com/watch?v=abc",
        "youtube_api_key": "test-key"
    });
    let (status, json) = send(app(), post_json("/functions/fetch-youtube-data", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid YouTube channel URL");
}

#[tokio::test]
async fn test_translate_without_gemini_key_is_server_error() {
    let body = json!({"text": "안녕하세요", "targetLanguage": "日本語"});
    let (status, json) = send(app(), post_json("/functions/translate", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_send_email_without_relay_is_server_error() {
    let body = json!({"to": "creator@example.com", "subject": "선정 안내", "html": "<p>축하합니다</p>"});
    let (status, json) = send(app(), post_json("/functions/send-email", body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("MAIL_RELAY_URL"));
}

#[tokio::test]
async fn test_revenue_import_with_no_valid_rows() {
    let dbs = RegionalDatabases::from_connections([(Region::Biz, empty_db())]);
    let request = Request::builder()
        .method("POST")
        .uri("/admin/finance/revenue/import")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from("date,type,amount\n,revenue,1000\n"))
        .unwrap();
    let (status, json) = send(app_with(dbs), request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "유효한 데이터가 없습니다.");
}

#[tokio::test]
async fn test_revenue_import_reports_unreadable_dates() {
    let dbs = RegionalDatabases::from_connections([(Region::Biz, empty_db())]);
    let request = Request::builder()
        .method("POST")
        .uri("/admin/finance/revenue/import")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from("date,type,amount\n2024/01/15,revenue,1000\n01-15-2024,revenue,2000\n"))
        .unwrap();
    let (status, json) = send(app_with(dbs), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("(3행)"));
}

#[tokio::test]
async fn test_finance_summary_needs_biz_database() {
    let request = Request::builder().uri("/admin/finance/summary").body(Body::empty()).unwrap();
    let (status, json) = send(app(), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().starts_with("biz 리전"));
}

#[tokio::test]
async fn test_list_faqs_returns_envelope() {
    let faq = faqs::Model {
        id: Uuid::new_v4(),
        question: "출금은 언제 되나요?".to_string(),
        answer: "승인 후 영업일 기준 3일 이내 지급됩니다.".to_string(),
        category: Some("출금".to_string()),
        display_order: 1,
        is_active: true,
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![faq.clone()]])
        .into_connection();
    let dbs = RegionalDatabases::from_connections([(Region::Biz, db)]);

    let request = Request::builder().uri("/cms/faqs").body(Body::empty()).unwrap();
    let (status, json) = send(app_with(dbs), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"][0]["question"], faq.question);
    assert_eq!(json["data"][0]["display_order"], 1);
}
