mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartBody, OPERATOR_EMAIL, TestApp, empty_request, json_request, relative, spawn_app};
use geosocial_api::{
    mailer::Email,
    models::{Marker, UserStatus},
    repository::Repository,
};
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

async fn create_employee(app: &TestApp, token: &str, form: MultipartBody) -> (StatusCode, Value) {
    app.send(form.into_request(Method::POST, "/api/employees", token))
        .await
}

fn hire(email: &str) -> MultipartBody {
    MultipartBody::new()
        .text("name", "Dana Field")
        .text("email", email)
        .text("phone", "+33 6 00 00 00 00")
}

/// The notification is sent from a detached task; give it a moment to land.
async fn wait_for_mail(app: &TestApp, subject: &str) -> Option<Email> {
    for _ in 0..50 {
        if let Some(email) = app.mailer.sent().into_iter().find(|e| e.subject == subject) {
            return Some(email);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn test_regular_user_is_refused() {
    let app = spawn_app();
    let (_, token) = app.seed_user("worker@example.com", UserStatus::Active).await;

    for (method, uri) in [
        (Method::GET, "/api/employees"),
        (Method::GET, "/api/users"),
        (Method::DELETE, "/api/employees/00000000-0000-0000-0000-000000000000"),
    ] {
        let (status, body) = app.send(empty_request(method, uri, Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["message"], "Access denied. Privileged operator rights required.");
    }

    let (status, _) = app.send(empty_request(Method::GET, "/api/employees", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_status_and_allowlist_both_grant_access() {
    let app = spawn_app();
    let (_, admin_token) = app.seed_user("boss@example.com", UserStatus::Admin).await;
    let (_, operator_token) = app.seed_user(OPERATOR_EMAIL, UserStatus::Active).await;

    for token in [&admin_token, &operator_token] {
        let (status, body) = app.send(empty_request(Method::GET, "/api/employees", Some(token))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["employees"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_create_employee_stores_files_and_notifies_operators() {
    let app = spawn_app();
    let (_, token) = app.seed_user(OPERATOR_EMAIL, UserStatus::Active).await;
    app.seed_user("boss@example.com", UserStatus::Admin).await;
    app.seed_user("worker@example.com", UserStatus::Active).await;

    let (status, body) = create_employee(
        &app,
        &token,
        hire(" Dana@Example.com ")
            .text("startDate", "2024-01-15")
            .text("certificateEndDate", "2026-06-30T00:00:00Z")
            .file("faceImage", "face.jpg", "image/jpeg", b"face")
            .file("certificate", "cert.pdf", "application/pdf", b"%PDF"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Employee created");

    let employee = &body["employee"];
    assert_eq!(employee["email"], "dana@example.com");
    assert!(employee["startDate"].as_str().unwrap().starts_with("2024-01-15"));
    assert!(employee["certificateEndDate"].as_str().unwrap().starts_with("2026-06-30"));
    assert!(employee["endDate"].is_null());

    let face = relative(employee["faceImage"].as_str().unwrap());
    let certificate = relative(employee["certificate"].as_str().unwrap());
    assert!(face.starts_with("uploads/employees/employee-") && face.ends_with(".jpg"));
    assert!(certificate.ends_with(".pdf"));
    assert!(app.storage.contains(&face));
    assert!(app.storage.contains(&certificate));

    let email = wait_for_mail(&app, "New employee: Dana Field")
        .await
        .expect("notification was not sent");
    let mut to = email.to.clone();
    to.sort();
    assert_eq!(to, vec!["boss@example.com".to_string(), OPERATOR_EMAIL.to_string()]);
}

#[tokio::test]
async fn test_create_employee_from_json_body() {
    let app = spawn_app();
    let (_, token) = app.seed_user("boss@example.com", UserStatus::Admin).await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/employees",
            Some(&token),
            json!({
                "name": "Dana Field",
                "email": "Dana@Example.com",
                "phone": "+33 6 00 00 00 00",
                "startDate": "2024-01-15"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["employee"]["email"], "dana@example.com");
    assert_eq!(body["employee"]["faceImage"], "");
    assert!(body["employee"]["startDate"].as_str().unwrap().starts_with("2024-01-15"));
}

#[tokio::test]
async fn test_create_employee_validation() {
    let app = spawn_app();
    let (_, token) = app.seed_user(OPERATOR_EMAIL, UserStatus::Active).await;

    let (status, body) = create_employee(
        &app,
        &token,
        MultipartBody::new().text("name", "No Contact"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Name, email and phone are required");

    let (status, _) = create_employee(&app, &token, hire("dana@example.com")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = create_employee(&app, &token, hire("DANA@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");

    let (status, _) = create_employee(
        &app,
        &token,
        hire("other@example.com").text("startDate", "next tuesday"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_employee(
        &app,
        &token,
        hire("third@example.com").file("certificate", "cert.docx", "application/msword", b"doc"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.repo.list_employees().await.unwrap().len(), 1);
    assert_eq!(app.storage.file_count(), 0);
}

#[tokio::test]
async fn test_update_employee_replaces_files() {
    let app = spawn_app();
    let (_, token) = app.seed_user("boss@example.com", UserStatus::Admin).await;

    let (_, body) = create_employee(
        &app,
        &token,
        hire("dana@example.com").file("faceImage", "old.png", "image/png", b"old"),
    )
    .await;
    let id = body["employee"]["id"].as_str().unwrap().to_string();
    let old_face = relative(body["employee"]["faceImage"].as_str().unwrap());
    create_employee(&app, &token, hire("taken@example.com")).await;

    let uri = format!("/api/employees/{id}");
    let (status, body) = app
        .send(
            MultipartBody::new()
                .text("phone", "0102030405")
                .text("name", "  ")
                .file("faceImage", "new.png", "image/png", b"new")
                .into_request(Method::PUT, &uri, &token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["employee"]["phone"], "0102030405");
    assert_eq!(body["employee"]["name"], "Dana Field");

    let new_face = relative(body["employee"]["faceImage"].as_str().unwrap());
    assert_ne!(new_face, old_face);
    assert!(app.storage.contains(&new_face));
    assert!(!app.storage.contains(&old_face));

    let (status, body) = app
        .send(
            MultipartBody::new()
                .text("email", "taken@example.com")
                .into_request(Method::PUT, &uri, &token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");

    let missing = format!("/api/employees/{}", Uuid::new_v4());
    let (status, _) = app
        .send(MultipartBody::new().text("phone", "1").into_request(Method::PUT, &missing, &token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_employee_removes_files() {
    let app = spawn_app();
    let (_, token) = app.seed_user(OPERATOR_EMAIL, UserStatus::Active).await;

    let (_, body) = create_employee(
        &app,
        &token,
        hire("dana@example.com")
            .file("faceImage", "face.png", "image/png", b"f")
            .file("certificate", "cert.pdf", "application/pdf", b"c"),
    )
    .await;
    let id = body["employee"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.storage.file_count(), 2);

    let uri = format!("/api/employees/{id}");
    let (status, body) = app.send(empty_request(Method::DELETE, &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Employee deleted");
    assert_eq!(app.storage.file_count(), 0);

    let (status, _) = app.send(empty_request(Method::DELETE, &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_management() {
    let app = spawn_app();
    let (_, token) = app.seed_user("boss@example.com", UserStatus::Admin).await;
    let (target, target_token) = app.seed_user("worker@example.com", UserStatus::Active).await;

    let (status, body) = app.send(empty_request(Method::GET, "/api/users", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert!(body["users"][0].get("password").is_none());

    let status_uri = format!("/api/users/{}/status", target.id);
    let (status, body) = app
        .send(json_request(Method::PUT, &status_uri, Some(&token), json!({ "status": "superuser" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status");

    let (status, body) = app
        .send(json_request(Method::PUT, &status_uri, Some(&token), json!({ "status": "blocked" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["status"], "blocked");

    // Promotion to admin opens the registry to that account.
    app.send(json_request(Method::PUT, &status_uri, Some(&token), json!({ "status": "admin" })))
        .await;
    let (status, _) = app
        .send(empty_request(Method::GET, "/api/employees", Some(&target_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_allowlisted_operator_cannot_be_managed() {
    let app = spawn_app();
    let (_, token) = app.seed_user("boss@example.com", UserStatus::Admin).await;
    let (operator, _) = app.seed_user(OPERATOR_EMAIL, UserStatus::Active).await;

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/users/{}/status", operator.id),
            Some(&token),
            json!({ "status": "blocked" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Privileged operator accounts cannot be modified");

    let (status, _) = app
        .send(empty_request(Method::DELETE, &format!("/api/users/{}", operator.id), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.repo.get_user(operator.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_user_removes_account_files() {
    let app = spawn_app();
    let (_, token) = app.seed_user(OPERATOR_EMAIL, UserStatus::Active).await;
    let (mut target, _) = app.seed_user("worker@example.com", UserStatus::Active).await;

    target.profile_image = "uploads/profiles/profile-1-000000001.png".into();
    app.storage.insert(&target.profile_image, "png");
    app.repo.save_user(&target).await.unwrap();

    let marker = Marker::new(target.id, 1.0, 2.0, "kept");
    app.repo.insert_marker(&marker).await.unwrap();

    let (status, body) = app
        .send(empty_request(Method::DELETE, &format!("/api/users/{}", target.id), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted");
    assert!(app.repo.get_user(target.id).await.unwrap().is_none());
    assert_eq!(app.storage.file_count(), 0);

    // Content outlives its author; the owner renders as null.
    let (_, body) = app
        .send(empty_request(Method::GET, &format!("/api/markers/{}", marker.id), Some(&token)))
        .await;
    assert!(body["marker"]["userId"].is_null());

    let (status, _) = app
        .send(empty_request(Method::DELETE, &format!("/api/users/{}", Uuid::new_v4()), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
