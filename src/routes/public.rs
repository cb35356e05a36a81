use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. The OTP flow is the only way to obtain a
/// session, so all of it lives here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register
        // Creates an unverified account and mails a code.
        .route("/api/auth/register", post(handlers::auth::register))
        // POST /api/auth/login
        // Mails a fresh code to an existing account.
        .route("/api/auth/login", post(handlers::auth::login))
        // POST /api/auth/verify-otp
        // Trades a valid code for an access/refresh token pair.
        .route("/api/auth/verify-otp", post(handlers::auth::verify_otp))
        // POST /api/auth/refresh-token
        .route("/api/auth/refresh-token", post(handlers::auth::refresh_token))
        // GET /api/server-info
        // Host and base URL the media links are built on.
        .route("/api/server-info", get(handlers::server::server_info))
}
