mod common;

use axum::http::{Method, StatusCode};
use common::{MultipartBody, TestApp, empty_request, json_request, relative, spawn_app};
use geosocial_api::{models::UserStatus, repository::Repository, storage::StorageService};
use serde_json::{Value, json};
use uuid::Uuid;

async fn create(app: &TestApp, token: &str, form: MultipartBody) -> (StatusCode, Value) {
    app.send(form.into_request(Method::POST, "/api/markers", token))
        .await
}

fn spot() -> MultipartBody {
    MultipartBody::new()
        .text("latitude", "1.2")
        .text("longitude", "3.4")
        .text("title", "Spot")
}

#[tokio::test]
async fn test_create_marker_defaults() {
    let app = spawn_app();
    let (user, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let (status, body) = create(&app, &token, spot()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Marker created");

    let marker = &body["marker"];
    assert_eq!(marker["latitude"], 1.2);
    assert_eq!(marker["longitude"], 3.4);
    assert_eq!(marker["title"], "Spot");
    assert_eq!(marker["color"], "#FF0000");
    assert_eq!(marker["comment"], "");
    assert_eq!(marker["userId"]["id"], user.id.to_string());
    assert!(marker["photos"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_and_update_marker_from_json_body() {
    let app = spawn_app();
    let (_, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/markers",
            Some(&token),
            json!({ "latitude": 1.2, "longitude": 3.4, "title": "Spot" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["marker"]["color"], "#FF0000");
    assert_eq!(body["marker"]["latitude"], 1.2);

    let id = body["marker"]["id"].as_str().unwrap();
    let (status, body) = app
        .send(json_request(
            Method::PUT,
            &format!("/api/markers/{id}"),
            Some(&token),
            json!({ "title": "Renamed", "color": "#00FF00" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["marker"]["title"], "Renamed");
    assert_eq!(body["marker"]["color"], "#00FF00");

    let (status, body) = app
        .send(json_request(Method::POST, "/api/markers", Some(&token), json!({ "title": "Spot" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_create_marker_requires_position_and_title() {
    let app = spawn_app();
    let (_, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let incomplete = [
        MultipartBody::new().text("longitude", "3.4").text("title", "Spot"),
        MultipartBody::new().text("latitude", "1.2").text("title", "Spot"),
        MultipartBody::new().text("latitude", "1.2").text("longitude", "3.4").text("title", "  "),
    ];
    for form in incomplete {
        let (status, body) = create(&app, &token, form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Latitude, longitude and title are required");
    }

    let (status, _) = create(
        &app,
        &token,
        MultipartBody::new()
            .text("latitude", "north")
            .text("longitude", "3.4")
            .text("title", "Spot"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.repo.list_markers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_marker_uploads_become_absolute_urls() {
    let app = spawn_app();
    let (_, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let (status, body) = create(
        &app,
        &token,
        spot()
            .text("color", "#00FF00")
            .file("photos", "a.png", "image/png", b"a")
            .file("photos", "b.png", "image/png", b"b")
            .file("videos", "c.mp4", "video/mp4", b"c"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["marker"]["color"], "#00FF00");

    let photos = body["marker"]["photos"].as_array().unwrap();
    let videos = body["marker"]["videos"].as_array().unwrap();
    assert_eq!(photos.len(), 2);
    assert_eq!(videos.len(), 1);
    for url in photos.iter().chain(videos) {
        let url = url.as_str().unwrap();
        assert!(url.starts_with("http://10.0.0.5:5000/uploads/markers/marker-"), "{url}");
        assert!(app.storage.contains(&relative(url)));
    }

    let mut too_many = spot();
    for i in 0..6 {
        too_many = too_many.file("videos", &format!("{i}.mp4"), "video/mp4", b"v");
    }
    let (status, _) = create(&app, &token, too_many).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.file_count(), 3);
}

#[tokio::test]
async fn test_update_keeps_coordinates_and_appends_media() {
    let app = spawn_app();
    let (_, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let (_, body) = create(&app, &token, spot().file("photos", "a.png", "image/png", b"a")).await;
    let id = body["marker"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            MultipartBody::new()
                .text("title", "Better spot")
                .text("comment", " bring water ")
                .text("latitude", "50.0")
                .file("photos", "b.png", "image/png", b"b")
                .into_request(Method::PUT, &format!("/api/markers/{id}"), &token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let marker = &body["marker"];
    assert_eq!(marker["title"], "Better spot");
    assert_eq!(marker["comment"], "bring water");
    assert_eq!(marker["latitude"], 1.2);
    assert_eq!(marker["photos"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .send(
            MultipartBody::new()
                .text("title", " ")
                .into_request(Method::PUT, &format!("/api/markers/{id}"), &token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_owner_can_change_marker() {
    let app = spawn_app();
    let (_, owner_token) = app.seed_user("owner@example.com", UserStatus::Active).await;
    let (_, other_token) = app.seed_user("other@example.com", UserStatus::Active).await;

    let (_, body) = create(&app, &owner_token, spot()).await;
    let id = body["marker"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            MultipartBody::new()
                .text("title", "Mine now")
                .into_request(Method::PUT, &format!("/api/markers/{id}"), &other_token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(empty_request(Method::DELETE, &format!("/api/markers/{id}"), Some(&other_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Everyone signed in can still read it.
    let (status, body) = app
        .send(empty_request(Method::GET, &format!("/api/markers/{id}"), Some(&other_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marker"]["title"], "Spot");

    let (status, body) = app
        .send(empty_request(Method::GET, &format!("/api/markers/{}", Uuid::new_v4()), Some(&owner_token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Marker not found");
}

#[tokio::test]
async fn test_list_markers_by_user() {
    let app = spawn_app();
    let (alice, alice_token) = app.seed_user("alice@example.com", UserStatus::Active).await;
    let (_, bob_token) = app.seed_user("bob@example.com", UserStatus::Active).await;

    create(&app, &alice_token, spot()).await;
    create(&app, &alice_token, spot()).await;
    create(&app, &bob_token, spot()).await;

    let (_, body) = app.send(empty_request(Method::GET, "/api/markers", Some(&bob_token))).await;
    assert_eq!(body["markers"].as_array().unwrap().len(), 3);

    let (_, body) = app
        .send(empty_request(Method::GET, &format!("/api/markers/user/{}", alice.id), Some(&bob_token)))
        .await;
    let markers = body["markers"].as_array().unwrap();
    assert_eq!(markers.len(), 2);
    assert!(markers.iter().all(|m| m["userId"]["email"] == "alice@example.com"));
}

#[tokio::test]
async fn test_delete_marker_removes_all_files() {
    let app = spawn_app();
    let (_, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let (_, body) = create(
        &app,
        &token,
        spot()
            .file("photos", "a.png", "image/png", b"a")
            .file("videos", "b.mp4", "video/mp4", b"b"),
    )
    .await;
    let id = body["marker"]["id"].as_str().unwrap().to_string();

    // A file that vanished from disk must not block the delete.
    let photo = relative(body["marker"]["photos"][0].as_str().unwrap());
    assert!(app.storage.remove(&photo).await.unwrap());

    let (status, body) = app
        .send(empty_request(Method::DELETE, &format!("/api/markers/{id}"), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Marker deleted");
    assert_eq!(app.storage.file_count(), 0);
    assert!(
        app.repo
            .get_marker(Uuid::parse_str(&id).unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_delete_marker_media_by_type_and_index() {
    let app = spawn_app();
    let (_, token) = app.seed_user("mapper@example.com", UserStatus::Active).await;

    let (_, body) = create(
        &app,
        &token,
        spot()
            .file("photos", "a.png", "image/png", b"a")
            .file("videos", "b.mp4", "video/mp4", b"b"),
    )
    .await;
    let id = body["marker"]["id"].as_str().unwrap().to_string();
    let video = relative(body["marker"]["videos"][0].as_str().unwrap());

    for (kind, index) in [("audio", "0"), ("photo", "1"), ("video", "abc")] {
        let (status, body) = app
            .send(empty_request(
                Method::DELETE,
                &format!("/api/markers/{id}/media/{kind}/{index}"),
                Some(&token),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{kind}/{index}");
        assert_eq!(body["message"], "Invalid media type or index");
    }

    let (status, body) = app
        .send(empty_request(
            Method::DELETE,
            &format!("/api/markers/{id}/media/video/0"),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["marker"]["videos"].as_array().unwrap().is_empty());
    assert_eq!(body["marker"]["photos"].as_array().unwrap().len(), 1);
    assert!(!app.storage.contains(&video));
    assert_eq!(app.storage.file_count(), 1);
}
