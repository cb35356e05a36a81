use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use std::slice;
use uuid::Uuid;

use super::{active_publication, owned_publication, page_window, parse_coordinate, parse_tags, total_pages};
use crate::{
    AppState,
    auth::AuthUser,
    errors::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery, FormBody},
    media::{FileField, FormData, PUBLICATION_MEDIA},
    models::{
        Comment, CreateCommentRequest, Location, MediaAttachment, PageQuery, Publication, PublicationForm,
        PublicationKind, Visibility,
    },
    views::{
        CommentList, CommentResponse, LikeResponse, MediaListResponse, MessageResponse, Pagination,
        PublicationList, PublicationPage, PublicationResponse, PublicationView, ViewContext,
    },
};

const PUBLICATION_FIELDS: &[FileField] = &[FileField {
    name: "media",
    max_count: 10,
    policy: &PUBLICATION_MEDIA,
}];

async fn render(state: &AppState, publication: &Publication) -> ApiResult<PublicationView> {
    let ctx =
        ViewContext::for_publications(state.repo.as_ref(), &state.server, slice::from_ref(publication))
            .await?;
    Ok(ctx.publication(publication))
}

/// Location is only taken when both coordinates are present.
fn location_from(form: &FormData) -> ApiResult<Option<Location>> {
    let (Some(lat), Some(lng)) = (form.trimmed("latitude"), form.trimmed("longitude")) else {
        return Ok(None);
    };

    Ok(Some(Location {
        latitude: parse_coordinate("latitude", lat)?,
        longitude: parse_coordinate("longitude", lng)?,
        address: form.trimmed("address").map(str::to_string),
        place_name: form.trimmed("placeName").map(str::to_string),
    }))
}

/// Fields shared by create and update. Only fields present in the form are touched;
/// an empty `tags` clears the tags, an empty `category` clears the category.
fn apply_form(publication: &mut Publication, form: &FormData) -> ApiResult<()> {
    if let Some(location) = location_from(form)? {
        publication.location = Some(location);
    }
    if let Some(tags) = form.text("tags") {
        publication.tags = parse_tags(tags);
    }
    if let Some(category) = form.text("category") {
        let category = category.trim();
        publication.category = (!category.is_empty()).then(|| category.to_string());
    }
    if let Some(visibility) = form.trimmed("visibility") {
        publication.visibility = Visibility::parse(visibility)
            .ok_or_else(|| ApiError::validation("Invalid visibility"))?;
    }
    Ok(())
}

/// create_publication
///
/// Multipart post with up to ten `media` files. Every file is checked before any is
/// written.
#[utoipa::path(
    post,
    path = "/api/publications",
    request_body(content = PublicationForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Publication created", body = PublicationResponse),
        (status = 400, description = "Blank content, bad field or rejected file")
    )
)]
pub async fn create_publication(
    auth: AuthUser,
    State(state): State<AppState>,
    body: FormBody,
) -> ApiResult<(StatusCode, Json<PublicationResponse>)> {
    let mut form = body.read(PUBLICATION_FIELDS).await?;

    let content = form
        .trimmed("content")
        .ok_or_else(|| ApiError::validation("Content is required"))?;
    let mut publication = Publication::new(auth.id, content);

    if let Some(kind) = form.trimmed("type") {
        publication.kind = PublicationKind::parse(kind)
            .ok_or_else(|| ApiError::validation("Invalid publication type"))?;
    }
    apply_form(&mut publication, &form)?;

    let stored = state
        .media()
        .accept_all(&PUBLICATION_MEDIA, form.take_files("media"))
        .await?;
    publication.media.extend(stored.into_iter().map(MediaAttachment::from));

    state.repo.insert_publication(&publication).await?;
    tracing::info!(
        publication_id = %publication.id,
        user_id = %auth.id,
        media = publication.media.len(),
        "publication created"
    );

    Ok((
        StatusCode::CREATED,
        Json(PublicationResponse {
            message: Some("Publication created".into()),
            publication: render(&state, &publication).await?,
        }),
    ))
}

/// list_publications
///
/// Active publications, newest first, paged with `page` (default 1) and `limit`
/// (default 20).
#[utoipa::path(
    get,
    path = "/api/publications",
    params(PageQuery),
    responses((status = 200, description = "Feed page", body = PublicationPage))
)]
pub async fn list_publications(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<PublicationPage>> {
    let (page, limit) = page_window(&query);
    let offset = (page - 1).saturating_mul(limit);

    let publications = state.repo.list_active_publications(offset, limit).await?;
    let total = state.repo.count_active_publications().await?;

    let ctx = ViewContext::for_publications(state.repo.as_ref(), &state.server, &publications).await?;
    Ok(Json(PublicationPage {
        publications: publications.iter().map(|p| ctx.publication(p)).collect(),
        pagination: Pagination {
            current_page: page,
            total_pages: total_pages(total, limit),
            total,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/publications/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Owner id")),
    responses((status = 200, description = "Active publications of the user", body = PublicationList))
)]
pub async fn list_user_publications(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<PublicationList>> {
    let publications = state.repo.list_user_publications(user_id).await?;
    let ctx = ViewContext::for_publications(state.repo.as_ref(), &state.server, &publications).await?;

    Ok(Json(PublicationList {
        publications: publications.iter().map(|p| ctx.publication(p)).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/publications/{id}",
    params(("id" = Uuid, Path, description = "Publication id")),
    responses(
        (status = 200, description = "Found", body = PublicationResponse),
        (status = 404, description = "Missing or deleted")
    )
)]
pub async fn get_publication(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PublicationResponse>> {
    let publication = active_publication(state.repo.as_ref(), id).await?;

    Ok(Json(PublicationResponse {
        message: None,
        publication: render(&state, &publication).await?,
    }))
}

/// update_publication
///
/// Owner only. Applies the fields present in the form; new `media` files are appended.
#[utoipa::path(
    put,
    path = "/api/publications/{id}",
    params(("id" = Uuid, Path, description = "Publication id")),
    request_body(content = PublicationForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = PublicationResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Missing or deleted")
    )
)]
pub async fn update_publication(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    body: FormBody,
) -> ApiResult<Json<PublicationResponse>> {
    let mut publication = owned_publication(state.repo.as_ref(), id, auth.id).await?;
    let mut form = body.read(PUBLICATION_FIELDS).await?;

    if let Some(content) = form.text("content") {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::validation("Content is required"));
        }
        publication.content = content.to_string();
    }
    apply_form(&mut publication, &form)?;

    let stored = state
        .media()
        .accept_all(&PUBLICATION_MEDIA, form.take_files("media"))
        .await?;
    publication.media.extend(stored.into_iter().map(MediaAttachment::from));

    publication.touch();
    state.repo.save_publication(&publication).await?;

    Ok(Json(PublicationResponse {
        message: Some("Publication updated".into()),
        publication: render(&state, &publication).await?,
    }))
}

/// delete_publication
///
/// Soft delete: the record stays with `isActive = false`, its files are removed.
#[utoipa::path(
    delete,
    path = "/api/publications/{id}",
    params(("id" = Uuid, Path, description = "Publication id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Missing or already deleted")
    )
)]
pub async fn delete_publication(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let mut publication = owned_publication(state.repo.as_ref(), id, auth.id).await?;

    state.media().cascade_delete(&publication).await;
    publication.media.clear();
    publication.is_active = false;
    publication.touch();
    state.repo.save_publication(&publication).await?;
    tracing::info!(publication_id = %id, user_id = %auth.id, "publication deleted");

    Ok(Json(MessageResponse::new("Publication deleted")))
}

/// toggle_like
///
/// Likes the publication, or removes the caller's like when already present.
#[utoipa::path(
    post,
    path = "/api/publications/{id}/like",
    params(("id" = Uuid, Path, description = "Publication id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeResponse),
        (status = 404, description = "Missing or deleted")
    )
)]
pub async fn toggle_like(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    let publication = state
        .repo
        .toggle_like(id, auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Publication not found"))?;
    let liked = publication.likes.contains(&auth.id);

    Ok(Json(LikeResponse {
        message: if liked { "Liked" } else { "Like removed" }.into(),
        liked,
        likes_count: publication.likes.len(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/publications/{id}/comments",
    params(("id" = Uuid, Path, description = "Publication id")),
    responses(
        (status = 200, description = "Comments in posting order", body = CommentList),
        (status = 404, description = "Missing or deleted")
    )
)]
pub async fn list_comments(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<CommentList>> {
    let publication = active_publication(state.repo.as_ref(), id).await?;
    let ctx = ViewContext::for_publications(
        state.repo.as_ref(),
        &state.server,
        slice::from_ref(&publication),
    )
    .await?;

    Ok(Json(CommentList {
        comments: publication.comments.iter().map(|c| ctx.comment(c)).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/publications/{id}/comments",
    params(("id" = Uuid, Path, description = "Publication id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentResponse),
        (status = 400, description = "Blank comment"),
        (status = 404, description = "Missing or deleted")
    )
)]
pub async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let content = payload
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::validation("Comment is required"))?;

    let comment = Comment::new(auth.id, content);
    let publication = state
        .repo
        .append_comment(id, &comment)
        .await?
        .ok_or_else(|| ApiError::not_found("Publication not found"))?;

    let ctx = ViewContext::for_publications(
        state.repo.as_ref(),
        &state.server,
        slice::from_ref(&publication),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            message: "Comment added".into(),
            comment: ctx.comment(&comment),
        }),
    ))
}

/// delete_media
///
/// Owner only. Removes the attachment at `media_index` and its file.
#[utoipa::path(
    delete,
    path = "/api/publications/{id}/media/{media_index}",
    params(
        ("id" = Uuid, Path, description = "Publication id"),
        ("media_index" = String, Path, description = "Zero-based position in the media list")
    ),
    responses(
        (status = 200, description = "Remaining media", body = MediaListResponse),
        (status = 400, description = "Index out of range"),
        (status = 403, description = "Not the owner")
    )
)]
pub async fn delete_media(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((id, media_index)): ApiPath<(Uuid, String)>,
) -> ApiResult<Json<MediaListResponse>> {
    let mut publication = owned_publication(state.repo.as_ref(), id, auth.id).await?;

    state
        .media()
        .detach_at(&mut publication.media, &media_index)
        .await?;
    publication.touch();
    state.repo.save_publication(&publication).await?;

    let ctx = ViewContext::bare(&state.server);
    Ok(Json(MediaListResponse {
        message: "Media removed".into(),
        media: publication.media.iter().map(|m| ctx.media(m)).collect(),
    }))
}
