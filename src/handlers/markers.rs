use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use std::slice;
use uuid::Uuid;

use super::{owned_marker, parse_coordinate};
use crate::{
    AppState,
    auth::AuthUser,
    errors::{ApiError, ApiResult},
    extract::{ApiPath, FormBody},
    media::{self, FileField, FormData, MARKER_MEDIA},
    models::{Marker, MarkerForm, MarkerMediaType},
    views::{MarkerList, MarkerResponse, MarkerView, MessageResponse, ViewContext},
};

const MARKER_FIELDS: &[FileField] = &[
    FileField {
        name: "photos",
        max_count: 10,
        policy: &MARKER_MEDIA,
    },
    FileField {
        name: "videos",
        max_count: 5,
        policy: &MARKER_MEDIA,
    },
];

async fn render(state: &AppState, marker: &Marker) -> ApiResult<MarkerView> {
    let ctx = ViewContext::for_markers(state.repo.as_ref(), &state.server, slice::from_ref(marker))
        .await?;
    Ok(ctx.marker(marker))
}

/// Stores the `photos` and `videos` parts and appends their paths to the marker.
/// Both batches are checked before anything is written.
async fn attach_uploads(state: &AppState, marker: &mut Marker, form: &mut FormData) -> ApiResult<()> {
    let photos = form.take_files("photos");
    let videos = form.take_files("videos");
    for file in photos.iter().chain(videos.iter()) {
        media::MediaManager::check(&MARKER_MEDIA, file)?;
    }

    let manager = state.media();
    for stored in manager.accept_all(&MARKER_MEDIA, photos).await? {
        marker.photos.push(stored.path);
    }
    for stored in manager.accept_all(&MARKER_MEDIA, videos).await? {
        marker.videos.push(stored.path);
    }
    Ok(())
}

/// create_marker
///
/// `latitude`, `longitude` and `title` are required. Color defaults to `#FF0000`.
#[utoipa::path(
    post,
    path = "/api/markers",
    request_body(content = MarkerForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Marker created", body = MarkerResponse),
        (status = 400, description = "Missing coordinates or title, rejected file")
    )
)]
pub async fn create_marker(
    auth: AuthUser,
    State(state): State<AppState>,
    body: FormBody,
) -> ApiResult<(StatusCode, Json<MarkerResponse>)> {
    let mut form = body.read(MARKER_FIELDS).await?;

    let (Some(lat), Some(lng), Some(title)) = (
        form.trimmed("latitude"),
        form.trimmed("longitude"),
        form.trimmed("title"),
    ) else {
        return Err(ApiError::validation("Latitude, longitude and title are required"));
    };

    let mut marker = Marker::new(
        auth.id,
        parse_coordinate("latitude", lat)?,
        parse_coordinate("longitude", lng)?,
        title,
    );
    if let Some(comment) = form.trimmed("comment") {
        marker.comment = comment.to_string();
    }
    if let Some(color) = form.trimmed("color") {
        marker.color = color.to_string();
    }

    attach_uploads(&state, &mut marker, &mut form).await?;
    state.repo.insert_marker(&marker).await?;
    tracing::info!(
        marker_id = %marker.id,
        user_id = %auth.id,
        photos = marker.photos.len(),
        videos = marker.videos.len(),
        "marker created"
    );

    Ok((
        StatusCode::CREATED,
        Json(MarkerResponse {
            message: Some("Marker created".into()),
            marker: render(&state, &marker).await?,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/markers",
    responses((status = 200, description = "All markers, newest first", body = MarkerList))
)]
pub async fn list_markers(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<MarkerList>> {
    let markers = state.repo.list_markers().await?;
    let ctx = ViewContext::for_markers(state.repo.as_ref(), &state.server, &markers).await?;

    Ok(Json(MarkerList {
        markers: markers.iter().map(|m| ctx.marker(m)).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/markers/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Owner id")),
    responses((status = 200, description = "Markers of the user", body = MarkerList))
)]
pub async fn list_user_markers(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<MarkerList>> {
    let markers = state.repo.list_user_markers(user_id).await?;
    let ctx = ViewContext::for_markers(state.repo.as_ref(), &state.server, &markers).await?;

    Ok(Json(MarkerList {
        markers: markers.iter().map(|m| ctx.marker(m)).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/markers/{id}",
    params(("id" = Uuid, Path, description = "Marker id")),
    responses(
        (status = 200, description = "Found", body = MarkerResponse),
        (status = 404, description = "Missing")
    )
)]
pub async fn get_marker(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MarkerResponse>> {
    let marker = state
        .repo
        .get_marker(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Marker not found"))?;

    Ok(Json(MarkerResponse {
        message: None,
        marker: render(&state, &marker).await?,
    }))
}

/// update_marker
///
/// Owner only. `title`, `comment` and `color` are replaced when present; new photos
/// and videos are appended. Coordinates are fixed at creation.
#[utoipa::path(
    put,
    path = "/api/markers/{id}",
    params(("id" = Uuid, Path, description = "Marker id")),
    request_body(content = MarkerForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = MarkerResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Missing")
    )
)]
pub async fn update_marker(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    body: FormBody,
) -> ApiResult<Json<MarkerResponse>> {
    let mut marker = owned_marker(state.repo.as_ref(), id, auth.id).await?;
    let mut form = body.read(MARKER_FIELDS).await?;

    if let Some(title) = form.text("title") {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("Title is required"));
        }
        marker.title = title.to_string();
    }
    if let Some(comment) = form.text("comment") {
        marker.comment = comment.trim().to_string();
    }
    if let Some(color) = form.trimmed("color") {
        marker.color = color.to_string();
    }

    attach_uploads(&state, &mut marker, &mut form).await?;
    marker.touch();
    state.repo.save_marker(&marker).await?;

    Ok(Json(MarkerResponse {
        message: Some("Marker updated".into()),
        marker: render(&state, &marker).await?,
    }))
}

/// delete_marker
///
/// Owner only. Hard delete; every photo and video file goes with it.
#[utoipa::path(
    delete,
    path = "/api/markers/{id}",
    params(("id" = Uuid, Path, description = "Marker id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Missing")
    )
)]
pub async fn delete_marker(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let marker = owned_marker(state.repo.as_ref(), id, auth.id).await?;

    state.media().cascade_delete(&marker).await;
    state.repo.delete_marker(marker.id).await?;
    tracing::info!(marker_id = %id, user_id = %auth.id, "marker deleted");

    Ok(Json(MessageResponse::new("Marker deleted")))
}

/// delete_marker_media
///
/// Owner only. `media_type` is `photo` or `video`; anything else, or an index out of
/// range, answers 400.
#[utoipa::path(
    delete,
    path = "/api/markers/{id}/media/{media_type}/{index}",
    params(
        ("id" = Uuid, Path, description = "Marker id"),
        ("media_type" = String, Path, description = "photo | video"),
        ("index" = String, Path, description = "Zero-based position in that list")
    ),
    responses(
        (status = 200, description = "Updated marker", body = MarkerResponse),
        (status = 400, description = "Invalid type or index"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Missing")
    )
)]
pub async fn delete_marker_media(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((id, media_type, index)): ApiPath<(Uuid, String, String)>,
) -> ApiResult<Json<MarkerResponse>> {
    let mut marker = owned_marker(state.repo.as_ref(), id, auth.id).await?;

    let media_type = MarkerMediaType::parse(&media_type)
        .ok_or_else(|| ApiError::validation("Invalid media type or index"))?;
    state
        .media()
        .detach_at(marker.media_mut(media_type), &index)
        .await
        .map_err(|_| ApiError::validation("Invalid media type or index"))?;

    marker.touch();
    state.repo.save_marker(&marker).await?;

    Ok(Json(MarkerResponse {
        message: Some("Media removed".into()),
        marker: render(&state, &marker).await?,
    }))
}
