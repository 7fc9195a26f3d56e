#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use seo_dashboard::app::{AppState, router};
use seo_dashboard::loader::DataSource;
use seo_dashboard::login::PasswordGate;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;

const PASSWORD: &str = "letmein";

const RANKINGS: &str = "date,keyword,position,category_1,category_2,found_url,is_cannibalization,cannibalization_detail\n\
2024-06-01,trail runners,2,shoes,running,https://shop.example/trail,false,\n\
2024-06-01,loafers,15,shoes,casual,https://shop.example/loafers,false,\n\
2024-06-01,backpacks,40,bags,travel,https://shop.example/bags,false,\n\
2024-06-02,trail runners,1,shoes,running,https://shop.example/trail,true,\"{\"\"data\"\":[{\"\"pos\"\":1,\"\"url\"\":\"\"https://shop.example/trail\"\"}]}\"\n\
2024-06-02,loafers,9,shoes,casual,https://shop.example/loafers,false,\n\
2024-06-02,backpacks,,bags,travel,,false,\n";

fn app_with_csv(dir: &TempDir, contents: Option<&str>) -> Router {
    let path = dir.path().join("rankings.csv");
    if let Some(contents) = contents {
        fs::write(&path, contents).unwrap();
    }
    app_for(&path)
}

fn app_for(path: &Path) -> Router {
    let gate = PasswordGate::new(PASSWORD).unwrap();
    let state = AppState::new(DataSource::Csv(path.to_path_buf()), gate, Duration::from_secs(60));
    router(Arc::new(state))
}

async fn login(app: &Router, password: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("password={}", password)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

// Log in and return the "name=value" pair to send back as a cookie
async fn session_cookie(app: &Router) -> String {
    let response = login(app, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> axum::response::Response {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_json(app: &Router, uri: &str, cookie: &str) -> Value {
    let response = get(app, uri, Some(cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));

    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");

    let response = get(&app, "/api/detail", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(&app, "/api/detail", Some("session=forged")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(&app, "/login", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_does_not_create_a_session() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));

    let response = login(&app, "guess").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn overview_reports_project_health() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));
    let cookie = session_cookie(&app).await;

    let overview = get_json(&app, "/api/overview", &cookie).await;
    assert_eq!(overview["status"], "ok");
    assert_eq!(overview["latest_date"], "2024-06-02");
    assert_eq!(overview["first_date"], "2024-06-01");
    assert_eq!(overview["total_keywords"], 3);
    assert_eq!(overview["active_conflicts"], 1);
    assert_eq!(overview["average_position"], 5.0);
}

#[tokio::test]
async fn detail_applies_the_cascade() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));
    let cookie = session_cookie(&app).await;

    let detail = get_json(&app, "/api/detail?l1=shoes", &cookie).await;
    assert_eq!(detail["status"], "ok");
    assert_eq!(detail["record_count"], 4);
    assert_eq!(detail["options"][0]["labels"], serde_json::json!(["bags", "shoes"]));
    assert_eq!(detail["options"][1]["labels"], serde_json::json!(["casual", "running"]));

    // loafers moved from TOP 11-20 into TOP 4-10
    let buckets = detail["buckets"].as_array().unwrap();
    assert_eq!(buckets[1]["label"], "TOP 4-10");
    assert_eq!(buckets[1]["new_display"], "+1");
    assert_eq!(buckets[2]["lost_display"], "-1");

    let detail = get_json(&app, "/api/detail?l1=shoes&l1=bags&start=2024-06-02&end=2024-06-02", &cookie).await;
    assert_eq!(detail["record_count"], 3);
}

#[tokio::test]
async fn conflicts_only_shows_formatted_details() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));
    let cookie = session_cookie(&app).await;

    let detail = get_json(&app, "/api/detail?conflicts_only=true", &cookie).await;
    assert_eq!(detail["record_count"], 1);
    assert_eq!(detail["table"]["headers"][4], "conflict");
    assert_eq!(detail["table"]["rows"][0][4], "Pos 1: shop.example/trail");
}

#[tokio::test]
async fn empty_selection_is_reported() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));
    let cookie = session_cookie(&app).await;

    let detail = get_json(&app, "/api/detail?l1=bags&l2=running", &cookie).await;
    assert_eq!(detail["status"], "empty");
    assert_eq!(detail["record_count"], 0);

    let response = get(&app, "/chart/detail.png?l1=bags&l2=running", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreadable_source_degrades_to_no_data() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, None);
    let cookie = session_cookie(&app).await;

    let overview = get_json(&app, "/api/overview", &cookie).await;
    assert_eq!(overview["status"], "no_data");
    assert!(overview["message"].as_str().unwrap().starts_with("Connection error"));

    // The failure is served until the cache entry expires
    fs::write(dir.path().join("rankings.csv"), RANKINGS).unwrap();
    let overview = get_json(&app, "/api/overview", &cookie).await;
    assert_eq!(overview["status"], "no_data");
}

#[tokio::test]
async fn failed_load_is_retried_after_expiry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rankings.csv");
    let gate = PasswordGate::new(PASSWORD).unwrap();
    let state = AppState::new(DataSource::Csv(path.clone()), gate, Duration::ZERO);
    let app = router(Arc::new(state));
    let cookie = session_cookie(&app).await;

    let overview = get_json(&app, "/api/overview", &cookie).await;
    assert_eq!(overview["status"], "no_data");

    fs::write(&path, RANKINGS).unwrap();
    let overview = get_json(&app, "/api/overview", &cookie).await;
    assert_eq!(overview["status"], "ok");
}

#[tokio::test]
async fn unranked_only_selection_has_no_chart() {
    let dir = tempdir().unwrap();
    let contents = format!("{}2024-06-01,gift card,,,,,false,\n2024-06-02,gift card,,,,,false,\n", RANKINGS);
    let app = app_with_csv(&dir, Some(&contents));
    let cookie = session_cookie(&app).await;

    let detail = get_json(&app, "/api/detail?l1=(Uncategorized)", &cookie).await;
    assert_eq!(detail["status"], "ok");
    assert_eq!(detail["record_count"], 2);

    for uri in [
        "/chart/detail.png?l1=(Uncategorized)",
        "/chart/detail.png?l1=(Uncategorized)&per_keyword=true",
    ] {
        let response = get(&app, uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn csv_export_matches_the_filter() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/export/csv?l1=bags", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "date,keyword,position,found_url,category_1,category_2");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("2024-06-01,backpacks,40,"));
}

#[tokio::test]
async fn logout_ends_the_session() {
    let dir = tempdir().unwrap();
    let app = app_with_csv(&dir, Some(RANKINGS));
    let cookie = session_cookie(&app).await;

    let response = get(&app, "/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = get(&app, "/api/overview", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
