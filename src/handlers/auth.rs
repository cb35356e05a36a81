use axum::{Json, extract::State};
use chrono::Utc;

use super::{MIN_PASSWORD_LEN, normalize_email};
use crate::{
    AppState,
    auth::hash_password,
    errors::{ApiError, ApiResult},
    extract::ApiJson,
    mailer::OtpPurpose,
    models::{LoginRequest, RefreshTokenRequest, RegisterRequest, User, VerifyOtpRequest},
    otp::{self, OtpOutcome},
    views::{AccessTokenResponse, MessageResponse, SessionResponse, user_view},
};

fn required_email(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_email).filter(|e| !e.is_empty())
}

/// register
///
/// Creates an unverified account and mails a verification code. No session is issued
/// here; the client continues with `verify-otp`.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 400, description = "Missing fields, short password or existing user")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = required_email(payload.email.as_deref());
    let password = payload.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::validation("Email and password are required"));
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password is too short"));
    }

    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::validation("User already exists"));
    }

    let mut user = User::new(email, hash_password(&password).await?);
    state.repo.create_user(&user).await?;
    tracing::info!(user_id = %user.id, "account registered");

    otp::issue_for(
        state.repo.as_ref(),
        state.mailer.as_ref(),
        &mut user,
        OtpPurpose::Registration,
    )
    .await?;

    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// login
///
/// Starts a login challenge. Sessions are only ever issued by `verify-otp`.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 400, description = "Unknown user")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = required_email(payload.email.as_deref())
        .ok_or_else(|| ApiError::validation("Email is required"))?;

    let mut user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::validation("User not found"))?;

    otp::issue_for(
        state.repo.as_ref(),
        state.mailer.as_ref(),
        &mut user,
        OtpPurpose::Login,
    )
    .await?;

    Ok(Json(MessageResponse::new("OTP sent")))
}

/// verify_otp
///
/// Consumes the pending code. On success the account is marked verified and an
/// access/refresh pair is returned. A code works once.
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Unknown user, invalid or expired OTP")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let email = required_email(payload.email.as_deref());
    let (Some(email), Some(code)) = (email, payload.otp) else {
        return Err(ApiError::validation("Email and OTP are required"));
    };

    let mut user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::validation("User not found"))?;

    if otp::consume(&mut user, &code, Utc::now()) == OtpOutcome::Rejected {
        tracing::warn!(user_id = %user.id, "otp rejected");
        return Err(ApiError::validation("Invalid or expired OTP"));
    }
    state.repo.save_user(&user).await?;

    let access_token = state.sessions.issue_access_token(user.id, &user.email)?;
    let refresh_token = state.sessions.issue_refresh_token(user.id)?;
    tracing::info!(user_id = %user.id, "session issued");

    Ok(Json(SessionResponse {
        message: "Login successful".into(),
        access_token,
        refresh_token,
        user: user_view(&state.server, &user),
    }))
}

/// refresh_token
#[utoipa::path(
    post,
    path = "/api/auth/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Refresh token missing"),
        (status = 403, description = "Refresh token invalid or expired"),
        (status = 404, description = "User no longer exists")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshTokenRequest>,
) -> ApiResult<Json<AccessTokenResponse>> {
    let token = payload
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Refresh token required".into()))?;

    let access_token = state.sessions.refresh(state.repo.as_ref(), token.trim()).await?;
    Ok(Json(AccessTokenResponse { access_token }))
}
