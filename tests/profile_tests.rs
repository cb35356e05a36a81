mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartBody, empty_request, json_request, relative, spawn_app};
use geosocial_api::{
    auth::hash_password,
    models::{User, UserStatus},
    repository::Repository,
};
use serde_json::json;

#[tokio::test]
async fn test_update_name_trims_and_rejects_blank() {
    let app = spawn_app();
    let (user, token) = app.seed_user("name@example.com", UserStatus::Active).await;

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            "/api/user/update-name",
            Some(&token),
            json!({ "name": "  Ada  " }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["user"]["email"], "name@example.com");
    assert_eq!(app.repo.get_user(user.id).await.unwrap().unwrap().name, "Ada");

    let (status, _) = app
        .send(json_request(Method::PUT, "/api/user/update-name", Some(&token), json!({ "name": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password_requires_current_one() {
    let app = spawn_app();
    let mut user = User::new("pw@example.com", hash_password("oldpass").await.unwrap());
    user.is_verified = true;
    app.repo.create_user(&user).await.unwrap();
    let token = app.sessions.issue_access_token(user.id, &user.email).unwrap();

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            "/api/user/change-password",
            Some(&token),
            json!({ "currentPassword": "wrong", "newPassword": "newpass" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/user/change-password",
            Some(&token),
            json!({ "currentPassword": "oldpass", "newPassword": "short" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/user/change-password",
            Some(&token),
            json!({ "currentPassword": "oldpass", "newPassword": "newpass" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let stored = app.repo.get_user(user.id).await.unwrap().unwrap();
    assert!(bcrypt::verify("newpass", &stored.password_hash).unwrap());
}

#[tokio::test]
async fn test_profile_image_replace_and_delete() {
    let app = spawn_app();
    let (user, token) = app.seed_user("pic@example.com", UserStatus::Active).await;

    let upload = |name: &str| {
        MultipartBody::new()
            .file("profileImage", name, "image/png", b"\x89PNG")
            .into_request(Method::POST, "/api/user/upload-profile-image", &token)
    };

    let (status, body) = app.send(upload("a.png")).await;
    assert_eq!(status, StatusCode::OK);
    let first = relative(body["profileImageUrl"].as_str().unwrap());
    assert!(first.starts_with("uploads/profiles/profile-"));
    assert!(app.storage.contains(&first));

    let (status, body) = app.send(upload("b.png")).await;
    assert_eq!(status, StatusCode::OK);
    let second = relative(body["profileImageUrl"].as_str().unwrap());
    assert!(!app.storage.contains(&first), "previous image is removed");
    assert!(app.storage.contains(&second));

    let (status, _) = app
        .send(empty_request(Method::DELETE, "/api/user/delete-profile-image", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.storage.contains(&second));
    assert!(app.repo.get_user(user.id).await.unwrap().unwrap().profile_image.is_empty());
}

#[tokio::test]
async fn test_profile_image_type_and_field_checks() {
    let app = spawn_app();
    let (_, token) = app.seed_user("bad@example.com", UserStatus::Active).await;

    let (status, _) = app
        .send(
            MultipartBody::new()
                .file("profileImage", "notes.txt", "text/plain", b"hello")
                .into_request(Method::POST, "/api/user/upload-profile-image", &token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            MultipartBody::new()
                .file("avatar", "a.png", "image/png", b"x")
                .into_request(Method::POST, "/api/user/upload-profile-image", &token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(MultipartBody::new().into_request(Method::POST, "/api/user/upload-profile-image", &token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Image is required");
    assert_eq!(app.storage.file_count(), 0);
}

#[tokio::test]
async fn test_delete_account_removes_user_and_image() {
    let app = spawn_app();
    let (mut user, token) = app.seed_user("bye@example.com", UserStatus::Active).await;
    user.profile_image = "uploads/profiles/profile-1.png".into();
    app.repo.save_user(&user).await.unwrap();
    app.storage.insert("uploads/profiles/profile-1.png", "png");

    let (status, _) = app
        .send(empty_request(Method::DELETE, "/api/user/delete-account", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.repo.get_user(user.id).await.unwrap().is_none());
    assert!(!app.storage.contains("uploads/profiles/profile-1.png"));
}
