//! Request extractors that reject with `ApiError`.
//!
//! axum's stock `Json`, `Path`, `Query` and `Multipart` extractors answer malformed
//! input with plain-text bodies. These wrappers run the same extraction and convert
//! the rejection, so every 400 carries the `{message}` JSON body.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Multipart, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{header, request::Parts},
};
use serde_json::{Map, Value};

use crate::{
    errors::ApiError,
    media::{self, FileField, FormData},
};

/// JSON body; rejections become `ApiError::Validation`.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// FormBody
///
/// Body of the create/update endpoints. `multipart/form-data` carries text fields and
/// files; `application/json` carries the same text fields as one object and no files.
pub enum FormBody {
    Multipart(Multipart),
    Json(Map<String, Value>),
}

impl<S> FromRequest<S> for FormBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(&req) {
            let Json(object) = Json::<Map<String, Value>>::from_request(req, state).await?;
            return Ok(Self::Json(object));
        }
        Ok(Self::Multipart(Multipart::from_request(req, state).await?))
    }
}

impl FormBody {
    /// Buffers the body into `FormData`, enforcing the file limits of `fields`.
    pub async fn read(self, fields: &[FileField]) -> Result<FormData, ApiError> {
        match self {
            FormBody::Multipart(multipart) => media::read_form(multipart, fields).await,
            FormBody::Json(object) => Ok(FormData::from_json(object)),
        }
    }
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
}
