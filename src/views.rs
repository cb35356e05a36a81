//! Response shapes. Records store relative file paths; every view turns them into
//! absolute URLs through `ServerInfo` and resolves user references into summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ApiResult,
    models::{
        Comment, Employee, Location, Marker, MediaAttachment, MediaKind, Publication,
        PublicationKind, User, UserStatus, Visibility,
    },
    network::ServerInfo,
    repository::Repository,
};

// --- Entity views ---

/// OwnerSummary
///
/// The public face of a user when referenced from a post, comment or marker.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_image: String,
}

/// UserView
///
/// Account as shown to its owner and to privileged operators. Never carries the
/// password hash or OTP fields.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_image: String,
    pub status: UserStatus,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MediaView {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentView {
    pub id: Uuid,
    /// Commenter; `null` once the account is gone.
    #[serde(rename = "userId")]
    pub author: Option<OwnerSummary>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PublicationView {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub owner: Option<OwnerSummary>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PublicationKind,
    pub media: Vec<MediaView>,
    pub location: Option<Location>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub visibility: Visibility,
    pub likes: Vec<Uuid>,
    pub likes_count: usize,
    pub comments: Vec<CommentView>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MarkerView {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub owner: Option<OwnerSummary>,
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

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EmployeeView {
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

pub fn user_view(server: &ServerInfo, user: &User) -> UserView {
    UserView {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        profile_image: server.absolute_url(&user.profile_image),
        status: user.status,
        is_verified: user.is_verified,
        created_at: user.created_at,
    }
}

pub fn employee_view(server: &ServerInfo, employee: &Employee) -> EmployeeView {
    EmployeeView {
        id: employee.id,
        name: employee.name.clone(),
        email: employee.email.clone(),
        phone: employee.phone.clone(),
        face_image: server.absolute_url(&employee.face_image),
        certificate: server.absolute_url(&employee.certificate),
        start_date: employee.start_date,
        end_date: employee.end_date,
        certificate_start_date: employee.certificate_start_date,
        certificate_end_date: employee.certificate_end_date,
        created_at: employee.created_at,
        updated_at: employee.updated_at,
    }
}

/// ViewContext
///
/// Renders publications, comments and markers. Built with one batch lookup of every
/// user the records reference.
pub struct ViewContext<'a> {
    server: &'a ServerInfo,
    people: HashMap<Uuid, OwnerSummary>,
}

impl<'a> ViewContext<'a> {
    /// No user lookups; owner and commenter summaries render as `null`.
    pub fn bare(server: &'a ServerInfo) -> Self {
        Self {
            server,
            people: HashMap::new(),
        }
    }

    async fn load(
        repo: &dyn Repository,
        server: &'a ServerInfo,
        ids: HashSet<Uuid>,
    ) -> ApiResult<Self> {
        let ids: Vec<Uuid> = ids.into_iter().collect();
        let people = repo
            .get_users(&ids)
            .await?
            .into_iter()
            .map(|user| {
                let summary = OwnerSummary {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    profile_image: server.absolute_url(&user.profile_image),
                };
                (summary.id, summary)
            })
            .collect();
        Ok(Self { server, people })
    }

    pub async fn for_publications(
        repo: &dyn Repository,
        server: &'a ServerInfo,
        publications: &[Publication],
    ) -> ApiResult<Self> {
        let ids = publications
            .iter()
            .flat_map(|p| std::iter::once(p.user_id).chain(p.comments.iter().map(|c| c.user_id)))
            .collect();
        Self::load(repo, server, ids).await
    }

    pub async fn for_markers(
        repo: &dyn Repository,
        server: &'a ServerInfo,
        markers: &[Marker],
    ) -> ApiResult<Self> {
        let ids = markers.iter().map(|m| m.user_id).collect();
        Self::load(repo, server, ids).await
    }

    fn person(&self, id: Uuid) -> Option<OwnerSummary> {
        self.people.get(&id).cloned()
    }

    pub fn media(&self, media: &MediaAttachment) -> MediaView {
        MediaView {
            kind: media.kind,
            url: self.server.absolute_url(&media.path),
            filename: media.filename.clone(),
        }
    }

    pub fn comment(&self, comment: &Comment) -> CommentView {
        CommentView {
            id: comment.id,
            author: self.person(comment.user_id),
            content: comment.content.clone(),
            created_at: comment.created_at,
        }
    }

    pub fn publication(&self, p: &Publication) -> PublicationView {
        PublicationView {
            id: p.id,
            owner: self.person(p.user_id),
            content: p.content.clone(),
            kind: p.kind,
            media: p.media.iter().map(|m| self.media(m)).collect(),
            location: p.location.clone(),
            tags: p.tags.clone(),
            category: p.category.clone(),
            visibility: p.visibility,
            likes: p.likes.clone(),
            likes_count: p.likes.len(),
            comments: p.comments.iter().map(|c| self.comment(c)).collect(),
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }

    pub fn marker(&self, m: &Marker) -> MarkerView {
        MarkerView {
            id: m.id,
            owner: self.person(m.user_id),
            latitude: m.latitude,
            longitude: m.longitude,
            title: m.title.clone(),
            comment: m.comment.clone(),
            color: m.color.clone(),
            photos: m.photos.iter().map(|p| self.server.absolute_url(p)).collect(),
            videos: m.videos.iter().map(|v| self.server.absolute_url(v)).collect(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

// --- Response envelopes ---

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct UsersResponse {
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileImageResponse {
    pub message: String,
    pub profile_image_url: String,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub publication: PublicationView,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total: u64,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicationPage {
    pub publications: Vec<PublicationView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicationList {
    pub publications: Vec<PublicationView>,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LikeResponse {
    pub message: String,
    pub liked: bool,
    pub likes_count: usize,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentList {
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentResponse {
    pub message: String,
    pub comment: CommentView,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct MediaListResponse {
    pub message: String,
    pub media: Vec<MediaView>,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct MarkerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub marker: MarkerView,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct MarkerList {
    pub markers: Vec<MarkerView>,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct EmployeeResponse {
    pub message: String,
    pub employee: EmployeeView,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct EmployeeList {
    pub employees: Vec<EmployeeView>,
}
