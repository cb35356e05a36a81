use axum::{
    Json,
    extract::State,
};

use super::MIN_PASSWORD_LEN;
use crate::{
    AppState,
    auth::{AuthUser, hash_password, verify_password},
    errors::{ApiError, ApiResult},
    extract::{ApiJson, FormBody},
    media::{FileField, PROFILE_IMAGE},
    models::{ChangePasswordRequest, ProfileImageForm, UpdateNameRequest, User},
    views::{MessageResponse, ProfileImageResponse, UserResponse, user_view},
};

const PROFILE_FIELDS: &[FileField] = &[FileField {
    name: "profileImage",
    max_count: 1,
    policy: &PROFILE_IMAGE,
}];

async fn current_user(state: &AppState, auth: &AuthUser) -> ApiResult<User> {
    state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[utoipa::path(
    put,
    path = "/api/user/update-name",
    request_body = UpdateNameRequest,
    responses(
        (status = 200, description = "Name updated", body = UserResponse),
        (status = 400, description = "Blank name")
    )
)]
pub async fn update_name(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateNameRequest>,
) -> ApiResult<Json<UserResponse>> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::validation("Name is required"))?;

    let mut user = current_user(&state, &auth).await?;
    user.name = name.to_string();
    state.repo.save_user(&user).await?;

    Ok(Json(UserResponse {
        message: "Name updated".into(),
        user: user_view(&state.server, &user),
    }))
}

/// change_password
///
/// Requires the current password; the new one must be at least six characters.
#[utoipa::path(
    put,
    path = "/api/user/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Missing fields, short or wrong password")
    )
)]
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let current = payload.current_password.filter(|p| !p.is_empty());
    let new = payload.new_password.filter(|p| !p.is_empty());
    let (Some(current), Some(new)) = (current, new) else {
        return Err(ApiError::validation("Current and new password are required"));
    };
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password is too short"));
    }

    let mut user = current_user(&state, &auth).await?;
    if !verify_password(&current, &user.password_hash).await? {
        tracing::warn!(user_id = %user.id, "password change with wrong current password");
        return Err(ApiError::validation("Current password is incorrect"));
    }

    user.password_hash = hash_password(&new).await?;
    state.repo.save_user(&user).await?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(Json(MessageResponse::new("Password changed")))
}

/// upload_profile_image
///
/// Replaces the profile picture; the previous file is removed.
#[utoipa::path(
    post,
    path = "/api/user/upload-profile-image",
    request_body(content = ProfileImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = ProfileImageResponse),
        (status = 400, description = "Missing or rejected image")
    )
)]
pub async fn upload_profile_image(
    auth: AuthUser,
    State(state): State<AppState>,
    body: FormBody,
) -> ApiResult<Json<ProfileImageResponse>> {
    let mut form = body.read(PROFILE_FIELDS).await?;
    let file = form
        .take_file("profileImage")
        .ok_or_else(|| ApiError::validation("Image is required"))?;

    let mut user = current_user(&state, &auth).await?;
    let manager = state.media();
    let stored = manager.accept(&PROFILE_IMAGE, file).await?;
    manager.replace(&mut user.profile_image, stored.path).await;
    state.repo.save_user(&user).await?;

    Ok(Json(ProfileImageResponse {
        message: "Profile image updated".into(),
        profile_image_url: state.server.absolute_url(&user.profile_image),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/user/delete-profile-image",
    responses((status = 200, description = "Image removed", body = MessageResponse))
)]
pub async fn delete_profile_image(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<MessageResponse>> {
    let mut user = current_user(&state, &auth).await?;
    if !user.profile_image.is_empty() {
        state.media().remove(&user.profile_image).await;
        user.profile_image.clear();
        state.repo.save_user(&user).await?;
    }

    Ok(Json(MessageResponse::new("Profile image removed")))
}

/// delete_account
///
/// Hard-deletes the caller's account and its profile image. Publications and markers
/// are left in place; their owner summary becomes `null`.
#[utoipa::path(
    delete,
    path = "/api/user/delete-account",
    responses((status = 200, description = "Account deleted", body = MessageResponse))
)]
pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(user) = state.repo.get_user(auth.id).await? {
        state.media().cascade_delete(&user).await;
        state.repo.delete_user(user.id).await?;
        tracing::info!(user_id = %user.id, "account deleted");
    }

    Ok(Json(MessageResponse::new("Account deleted")))
}
