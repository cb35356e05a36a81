use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations ---

/// UserStatus
///
/// The RBAC field stored on every account. `Admin` is one of the two tracks that
/// open the privileged-operator gate (the other one is the configured allowlist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
    Admin,
}

/// PublicationKind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PublicationKind {
    #[default]
    Text,
    Photo,
    Video,
    Article,
    Event,
}

/// Visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Visibility {
    #[default]
    Public,
    Friends,
    Private,
}

/// MediaKind
///
/// Classification of an accepted upload. Documents only come from employee files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

/// MarkerMediaType
///
/// Path segment of `DELETE /api/markers/{id}/media/{type}/{index}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerMediaType {
    Photo,
    Video,
}

// Text round-trips used by the Postgres rows and by request parsing.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

text_enum!(UserStatus { Active => "active", Blocked => "blocked", Admin => "admin" });
text_enum!(PublicationKind {
    Text => "text",
    Photo => "photo",
    Video => "video",
    Article => "article",
    Event => "event",
});
text_enum!(Visibility { Public => "public", Friends => "friends", Private => "private" });
text_enum!(MediaKind { Image => "image", Video => "video", Document => "document" });
text_enum!(MarkerMediaType { Photo => "photo", Video => "video" });

// --- Aggregates ---

/// User
///
/// Canonical account record. `otp`/`otp_expires` are transient challenge fields,
/// cleared as soon as a code is consumed.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    // Relative path under the storage root, empty when unset.
    pub profile_image: String,
    pub is_verified: bool,
    pub status: UserStatus,
    pub otp: Option<String>,
    pub otp_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
            ..Self::default()
        }
    }
}

/// Employee
///
/// Registry entry managed by privileged operators. Independent email namespace
/// from `User`.
#[derive(Debug, Clone, Default)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub face_image: String,
    pub certificate: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub certificate_start_date: Option<DateTime<Utc>>,
    pub certificate_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// MediaAttachment
///
/// Embedded in a publication; `path` is relative to the storage root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub path: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub place_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(user_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Publication
///
/// Social post aggregate. Media, tags, likes and comments are owned child
/// collections and are always persisted together with the post.
#[derive(Debug, Clone, Default)]
pub struct Publication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub kind: PublicationKind,
    pub media: Vec<MediaAttachment>,
    pub location: Option<Location>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub visibility: Visibility,
    pub likes: Vec<Uuid>,
    pub comments: Vec<Comment>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    pub fn new(user_id: Uuid, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            content: content.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Adds or removes `user_id` from the likes. Returns true when the post is now liked.
    pub fn toggle_like(&mut self, user_id: Uuid) -> bool {
        match self.likes.iter().position(|id| *id == user_id) {
            Some(index) => {
                self.likes.remove(index);
                false
            }
            None => {
                self.likes.push(user_id);
                true
            }
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub const DEFAULT_MARKER_COLOR: &str = "#FF0000";

/// Marker
///
/// Geolocated pin with photo/video paths (relative to the storage root).
#[derive(Debug, Clone, Default)]
pub struct Marker {
    pub id: Uuid,
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub comment: String,
    pub color: String,
    pub photos: Vec<String>,
    pub videos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Marker {
    pub fn new(user_id: Uuid, latitude: f64, longitude: f64, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            latitude,
            longitude,
            title: title.into(),
            color: DEFAULT_MARKER_COLOR.to_string(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn media_mut(&mut self, media_type: MarkerMediaType) -> &mut Vec<String> {
        match media_type {
            MarkerMediaType::Photo => &mut self.photos,
            MarkerMediaType::Video => &mut self.videos,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// --- Request Payloads (Input Schemas) ---
//
// Fields are optional so that a missing value yields our own 400 with a message
// instead of the extractor's generic rejection.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNameRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

/// PageQuery
///
/// `?page=&limit=` on the publication feed. Non-numeric values fall back to the defaults.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

// --- Multipart form documentation (OpenAPI only) ---

/// PublicationForm
///
/// `multipart/form-data` body of `POST/PUT /api/publications`. `tags` is comma separated;
/// up to 10 files under `media`.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct PublicationForm {
    pub content: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "photo")]
    pub kind: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub place_name: Option<String>,
    #[schema(example = "travel, food")]
    pub tags: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<String>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub media: Vec<Vec<u8>>,
}

/// MarkerForm
///
/// `multipart/form-data` body of `POST/PUT /api/markers`: up to 10 `photos` and 5 `videos`.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct MarkerForm {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub title: Option<String>,
    pub comment: Option<String>,
    #[schema(example = "#FF0000")]
    pub color: Option<String>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub photos: Vec<Vec<u8>>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub videos: Vec<Vec<u8>>,
}

/// EmployeeForm
///
/// `multipart/form-data` body of `POST/PUT /api/employees`. Dates accept RFC 3339 or `YYYY-MM-DD`.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub certificate_start_date: Option<String>,
    pub certificate_end_date: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub face_image: Option<Vec<u8>>,
    #[schema(value_type = String, format = Binary)]
    pub certificate: Option<Vec<u8>>,
}

/// ProfileImageForm
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImageForm {
    #[schema(value_type = String, format = Binary)]
    pub profile_image: Vec<u8>,
}
