use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    errors::ApiError,
    models::{User, UserStatus},
    repository::{Repository, RepositoryState},
};

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;
const BCRYPT_COST: u32 = 10;

/// TokenKind
///
/// Each kind is signed with its own secret, and the kind is also embedded in the
/// claims so that a refresh token can never be replayed as an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims
///
/// JWT payload for both token kinds. Refresh tokens carry identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id.
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    /// Signature was fine but `exp` has passed; the client should try a refresh.
    #[error("token expired")]
    Expired,
    /// Malformed, wrong signature, wrong secret or wrong kind.
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// SessionIssuer
///
/// Signs and validates the access/refresh token pair. Built once from `AppConfig`
/// and shared through the application state.
#[derive(Clone)]
pub struct SessionIssuer {
    access_secret: String,
    refresh_secret: String,
}

impl SessionIssuer {
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_refresh_secret)
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.access_secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    fn issue(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: Option<&str>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.map(str::to_string),
            kind,
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// 15-minute token carrying the user id and email.
    pub fn issue_access_token(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        self.issue(
            TokenKind::Access,
            user_id,
            Some(email),
            Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        )
    }

    /// 7-day token carrying only the user id.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(
            TokenKind::Refresh,
            user_id,
            None,
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
        )
    }

    /// verify
    ///
    /// Validates signature and expiry against the secret of `kind`, then checks that
    /// the declared kind matches. Signature is checked before expiry, so an expired
    /// token signed with the wrong secret reports `Invalid`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        if data.claims.kind != kind {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }

    /// refresh
    ///
    /// Mints a new access token from a valid refresh token. The refresh token itself
    /// is neither rotated nor revoked; it stays usable for its full lifetime.
    pub async fn refresh(
        &self,
        repo: &dyn Repository,
        refresh_token: &str,
    ) -> Result<String, ApiError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        Ok(self.issue_access_token(user.id, &user.email)?)
    }
}

/// AuthUser
///
/// Identity resolved from a valid access token. Resolution never touches the database.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Pulls the token out of `Authorization: Bearer <token>`. A literal `null` (what some
/// clients send when they have no token yet) counts as missing.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    match parts.next() {
        Some(token) if token != "null" => Some(token),
        _ => None,
    }
}

/// AuthUser Extractor Implementation
///
/// `NoToken -> TokenPresent -> Authenticated | Rejected(Expired) | Rejected(Invalid)`.
/// Missing tokens answer 401; expired and invalid tokens answer 403, the expired case
/// flagged so that clients know to refresh. When the auth middleware already resolved
/// the identity it is reused from the request extensions.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionIssuer: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ApiError::Unauthorized("Token missing - expected Authorization: Bearer <token>".into())
        })?;

        let issuer = SessionIssuer::from_ref(state);
        let claims = issuer.verify(token, TokenKind::Access).map_err(|e| {
            tracing::warn!(uri = %parts.uri, reason = %e, "access token rejected");
            ApiError::from(e)
        })?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email.unwrap_or_default(),
        })
    }
}

/// True when the user holds the `admin` status or is on the operator allowlist.
/// The two tracks are independent; either one is enough.
pub fn is_privileged(user: &User, config: &AppConfig) -> bool {
    user.status == UserStatus::Admin || config.is_privileged_operator(&user.email)
}

/// PrivilegedOperator
///
/// Second-tier gate for employee and user management. Loads the caller's record and
/// rejects with 403 unless `is_privileged` holds.
#[derive(Debug, Clone)]
pub struct PrivilegedOperator(pub User);

impl<S> FromRequestParts<S> for PrivilegedOperator
where
    S: Send + Sync,
    SessionIssuer: FromRef<S>,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match repo.get_user(auth.id).await? {
            Some(user) if is_privileged(&user, &config) => Ok(PrivilegedOperator(user)),
            _ => {
                tracing::warn!(user_id = %auth.id, "privileged route refused");
                Err(ApiError::forbidden("Access denied. Privileged operator rights required."))
            }
        }
    }
}

// --- Password hashing ---
// bcrypt is CPU bound, so it runs on the blocking pool.

pub async fn hash_password(password: &str) -> Result<String, ApiError> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hash)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new("access-secret", "refresh-secret")
    }

    fn expired_token(secret: &str, kind: TokenKind) -> String {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: Some("a@b.c".into()),
            kind,
            iat: now - 3600,
            exp: now - 60,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn access_token_round_trip_keeps_identity() {
        let id = Uuid::new_v4();
        let token = issuer().issue_access_token(id, "me@example.com").unwrap();
        let claims = issuer().verify(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, id);
        assert_eq!(claims.email.as_deref(), Some("me@example.com"));
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn refresh_token_has_no_email_and_seven_day_life() {
        let token = issuer().issue_refresh_token(Uuid::new_v4()).unwrap();
        let claims = issuer().verify(&token, TokenKind::Refresh).unwrap();

        assert!(claims.email.is_none());
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let refresh = issuer().issue_refresh_token(Uuid::new_v4()).unwrap();
        assert_eq!(
            issuer().verify(&refresh, TokenKind::Access).unwrap_err(),
            TokenError::Invalid
        );

        // Same secret for both kinds still fails on the embedded kind.
        let shared = SessionIssuer::new("same", "same");
        let refresh = shared.issue_refresh_token(Uuid::new_v4()).unwrap();
        assert_eq!(
            shared.verify(&refresh, TokenKind::Access).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn expired_is_distinguished_from_invalid() {
        let token = expired_token("access-secret", TokenKind::Access);
        assert_eq!(
            issuer().verify(&token, TokenKind::Access).unwrap_err(),
            TokenError::Expired
        );

        let foreign = expired_token("someone-else", TokenKind::Access);
        assert_eq!(
            issuer().verify(&foreign, TokenKind::Access).unwrap_err(),
            TokenError::Invalid
        );

        assert_eq!(
            issuer().verify("not.a.jwt", TokenKind::Access).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer null"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("hunter22").await.unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).await.unwrap());
        assert!(!verify_password("hunter23", &hash).await.unwrap());
    }
}
