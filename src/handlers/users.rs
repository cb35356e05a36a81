use axum::{
    Json,
    extract::State,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::PrivilegedOperator,
    errors::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    models::{UpdateStatusRequest, User, UserStatus},
    views::{MessageResponse, UserResponse, UsersResponse, user_view},
};

/// Loads a manageable account: 404 when missing, 403 when it is on the operator
/// allowlist (those accounts cannot be changed or removed from here).
async fn managed_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if state.config.is_privileged_operator(&user.email) {
        tracing::warn!(user_id = %id, "attempt to manage a protected operator account");
        return Err(ApiError::forbidden("Privileged operator accounts cannot be modified"));
    }
    Ok(user)
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All accounts", body = UsersResponse),
        (status = 403, description = "Privileged operator rights required")
    )
)]
pub async fn list_users(
    _operator: PrivilegedOperator,
    State(state): State<AppState>,
) -> ApiResult<Json<UsersResponse>> {
    let users = state.repo.list_users().await?;

    Ok(Json(UsersResponse {
        users: users.iter().map(|u| user_view(&state.server, u)).collect(),
    }))
}

/// update_user_status
///
/// Sets `active`, `blocked` or `admin`.
#[utoipa::path(
    put,
    path = "/api/users/{id}/status",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UserResponse),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Not privileged, or target is a protected operator"),
        (status = 404, description = "Missing")
    )
)]
pub async fn update_user_status(
    PrivilegedOperator(operator): PrivilegedOperator,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Json<UserResponse>> {
    let status = payload
        .status
        .as_deref()
        .and_then(UserStatus::parse)
        .ok_or_else(|| ApiError::validation("Invalid status"))?;

    let mut user = managed_user(&state, id).await?;
    user.status = status;
    state.repo.save_user(&user).await?;
    tracing::info!(
        user_id = %id,
        operator_id = %operator.id,
        status = status.as_str(),
        "user status changed"
    );

    Ok(Json(UserResponse {
        message: "Status updated".into(),
        user: user_view(&state.server, &user),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not privileged, or target is a protected operator"),
        (status = 404, description = "Missing")
    )
)]
pub async fn delete_user(
    PrivilegedOperator(operator): PrivilegedOperator,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let user = managed_user(&state, id).await?;

    state.media().cascade_delete(&user).await;
    state.repo.delete_user(user.id).await?;
    tracing::info!(user_id = %id, operator_id = %operator.id, "user deleted");

    Ok(Json(MessageResponse::new("User deleted")))
}
