//! HTTP routing and status-code tests
//!
//! Requests go through the full router with `oneshot`; identity is supplied
//! the way the upstream proxy does it, in the `x-clinician-id` header.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{assign, evaluation_count, fresh_db, seed_clinician, seed_image_set};
use http_body_util::BodyExt;
use imgeval_server::api::CLINICIAN_HEADER;
use imgeval_server::db;
use imgeval_server::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app() -> (TempDir, SqlitePool, Router) {
    let (dir, pool) = fresh_db().await;
    let state = AppState::new(pool.clone(), "/media/", None);
    (dir, pool, build_router(state))
}

fn request(method: Method, uri: &str, clinician: Option<i64>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = clinician {
        builder = builder.header(CLINICIAN_HEADER, id.to_string());
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, _pool, app) = test_app().await;

    let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "imgeval-server");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_validate_token_responses() {
    let (_dir, pool, app) = test_app().await;
    let mut conn = pool.acquire().await.unwrap();
    let invitation = db::invitations::create_invitation(&mut conn).await.unwrap();
    drop(conn);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/validate-token",
            None,
            Some(json!({"token": invitation.token.to_string()})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"valid": true, "message": "Valid invitation token"}));

    let (_, body) = send(
        &app,
        request(Method::POST, "/api/validate-token", None, Some(json!({"token": ""}))),
    )
    .await;
    assert_eq!(body, json!({"valid": false, "message": "Token is required"}));

    let (_, body) = send(
        &app,
        request(
            Method::POST,
            "/api/validate-token",
            None,
            Some(json!({"token": "not-a-uuid"})),
        ),
    )
    .await;
    assert_eq!(
        body,
        json!({"valid": false, "message": "Invalid or already used token"})
    );

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/validate-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"valid": false, "message": "Invalid request"}));
}

#[tokio::test]
async fn test_register_then_use_profile() {
    let (_dir, pool, app) = test_app().await;
    let mut conn = pool.acquire().await.unwrap();
    let invitation = db::invitations::create_invitation(&mut conn).await.unwrap();
    drop(conn);

    let form = json!({
        "token": invitation.token.to_string(),
        "username": "jsnow",
        "email": "jsnow@hospital.test",
        "first_name": "John",
        "last_name": "Snow",
        "title": "Epidemiologist",
        "workplace": "Broad Street",
        "years_experience": 20,
        "password": "StrongPassword123!",
        "password_confirmation": "StrongPassword123!"
    });

    let (status, body) = send(&app, request(Method::POST, "/api/register", None, Some(form.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let clinician_id = body["clinician_id"].as_i64().unwrap();

    let (status, body) = send(&app, request(Method::POST, "/api/register", None, Some(form))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "token");

    let (status, body) = send(&app, request(Method::GET, "/api/profile", Some(clinician_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "jsnow");
    assert_eq!(body["years_experience"], 20);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/profile",
            Some(clinician_id),
            Some(json!({
                "email": "john.snow@hospital.test",
                "first_name": "John",
                "last_name": "Snow",
                "title": "Physician",
                "workplace": "Soho",
                "years_experience": 21
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Physician");
}

#[tokio::test]
async fn test_identity_required() {
    let (_dir, _pool, app) = test_app().await;

    let (status, body) = send(&app, request(Method::GET, "/api/next-image", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = send(&app, request(Method::GET, "/api/next-image", Some(404), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submit_evaluation_status_codes() {
    let (_dir, pool, app) = test_app().await;
    let (set_id, image_ids) = seed_image_set(&pool, "chest", 2).await;
    let (_, foreign_images) = seed_image_set(&pool, "skin", 1).await;
    let clinician = seed_clinician(&pool, "dr_a", false).await;
    assign(&pool, clinician, set_id, &[]).await;

    let submit = |body: Value| request(Method::POST, "/api/submit-evaluation", Some(clinician), Some(body));

    let (status, body) = send(&app, submit(json!({"image_id": image_ids[0], "is_real": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields");
    assert_eq!(body["field"], "confidence");

    let (status, body) = send(
        &app,
        submit(json!({"image_id": image_ids[0], "is_real": true, "confidence": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "confidence");

    let (status, _) = send(
        &app,
        submit(json!({"image_id": 9999, "is_real": true, "confidence": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        submit(json!({"image_id": foreign_images[0], "is_real": true, "confidence": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(
        &app,
        submit(json!({"image_id": image_ids[0], "is_real": true, "confidence": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Evaluation submitted successfully");
    assert!(body["evaluation_id"].is_i64());

    let (status, body) = send(
        &app,
        submit(json!({"image_id": image_ids[0], "is_real": false, "confidence": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_EVALUATED");

    assert_eq!(evaluation_count(&pool).await, 1);
}

#[tokio::test]
async fn test_next_image_response_shape() {
    let (_dir, pool, app) = test_app().await;
    let (set_id, image_ids) = seed_image_set(&pool, "chest", 1).await;
    let clinician = seed_clinician(&pool, "dr_a", false).await;
    let assignment_id = assign(&pool, clinician, set_id, &[]).await;

    let uri = format!("/api/next-image?assignment_id={}", assignment_id);
    let (status, body) = send(&app, request(Method::GET, &uri, Some(clinician), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], false);
    assert_eq!(body["image_id"], image_ids[0]);
    assert_eq!(body["image_url"], "/media/chest/img_000.png");
    assert_eq!(body["remaining"], 1);
    assert_eq!(body["progress"]["total"], 1);

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/submit-evaluation",
            Some(clinician),
            Some(json!({"image_id": image_ids[0], "is_real": true, "confidence": 5})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request(Method::GET, &uri, Some(clinician), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert!(body.get("image_url").is_none());
    assert_eq!(body["progress"]["percentage"], 100.0);

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/next-image?assignment_id=abc", Some(clinician), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_admin_flag() {
    let (_dir, pool, app) = test_app().await;
    let clinician = seed_clinician(&pool, "dr_a", false).await;

    for uri in ["/api/admin/image-sets", "/api/admin/report", "/api/admin/invitations"] {
        let (status, body) = send(&app, request(Method::GET, uri, Some(clinician), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["message"], "You are not authorized to perform this action");
    }
}

#[tokio::test]
async fn test_admin_split_assign_and_export() {
    let (_dir, pool, app) = test_app().await;
    let admin = seed_clinician(&pool, "admin", true).await;
    let dr_a = seed_clinician(&pool, "dr_a", false).await;
    let dr_b = seed_clinician(&pool, "dr_b", false).await;
    let (set_id, image_ids) = seed_image_set(&pool, "chest", 5).await;

    let (status, body) = send(&app, request(Method::GET, "/api/admin/image-sets", Some(admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "chest");
    assert_eq!(body[0]["image_count"], 5);
    assert_eq!(body[0]["real_count"], 3);
    assert_eq!(body[0]["synth_count"], 2);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/admin/image-sets/{}/split", set_id),
            Some(admin),
            Some(json!({"clinician_ids": [dr_a, dr_b]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "assigned");
    assert_eq!(body["shares"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/admin/assignments",
            Some(admin),
            Some(json!({"clinician_id": dr_a, "image_set_id": set_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(&app, request(Method::GET, "/api/next-image", Some(dr_a), None)).await;
    assert_eq!(status, StatusCode::OK);
    let image_id = body["image_id"].as_i64().unwrap();
    assert!(image_ids.contains(&image_id));

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/submit-evaluation",
            Some(dr_a),
            Some(json!({"image_id": image_id, "is_real": true, "confidence": "4"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/admin/evaluations/export", Some(admin), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"evaluations_export_"));
    assert!(disposition.ends_with(".json\""));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let records: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["clinician"]["username"], "dr_a");
    assert_eq!(records[0]["image_id"], image_id);
    assert_eq!(records[0]["confidence"], 4);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/admin/image-sets/{}/active", set_id),
            Some(admin),
            Some(json!({"is_active": false})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, body) = send(&app, request(Method::GET, "/api/next-image", Some(dr_a), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
}

#[tokio::test]
async fn test_admin_invitations() {
    let (_dir, pool, app) = test_app().await;
    let admin = seed_clinician(&pool, "admin", true).await;

    let (status, created) = send(&app, request(Method::POST, "/api/admin/invitations", Some(admin), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_used"], false);

    let (status, body) = send(&app, request(Method::GET, "/api/admin/invitations", Some(admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["token"], created["token"]);
}
