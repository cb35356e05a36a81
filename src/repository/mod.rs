use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Comment, Employee, Marker, Publication, User};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    /// Unique constraint hit; carries the human name of the field.
    #[error("{0} already in use")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers only see this trait,
/// so the Postgres implementation and the in-memory one used by tests and local runs
/// are interchangeable.
///
/// Aggregates are read and written whole: a publication's media and tags (or a
/// marker's photo/video lists) travel with their parent in one statement, so a caller
/// never observes a half-written child collection. Likes and comments are the
/// exception: many users write them at once, so they change only through
/// `toggle_like` and `append_comment`, each a single atomic statement.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `Duplicate("Email")` when the email is taken.
    async fn create_user(&self, user: &User) -> RepoResult<()>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Batch lookup used to resolve owner and commenter summaries.
    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Users with `status = admin` or whose (lowercased) email is in `operator_emails`.
    async fn list_notification_recipients(&self, operator_emails: &[String]) -> RepoResult<Vec<User>>;
    async fn save_user(&self, user: &User) -> RepoResult<()>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Publications ---
    async fn insert_publication(&self, publication: &Publication) -> RepoResult<()>;
    /// Returns inactive (soft-deleted) rows too; visibility is the caller's call.
    async fn get_publication(&self, id: Uuid) -> RepoResult<Option<Publication>>;
    /// Writes everything except `likes` and `comments`.
    async fn save_publication(&self, publication: &Publication) -> RepoResult<()>;
    /// Adds or removes `user_id` from the likes of an active publication and returns
    /// the updated row. `None` when the publication is missing or inactive.
    async fn toggle_like(&self, id: Uuid, user_id: Uuid) -> RepoResult<Option<Publication>>;
    /// Appends to the comments of an active publication. `None` when missing or inactive.
    async fn append_comment(&self, id: Uuid, comment: &Comment) -> RepoResult<Option<Publication>>;
    /// Active publications, newest first.
    async fn list_active_publications(&self, offset: u64, limit: u64) -> RepoResult<Vec<Publication>>;
    async fn count_active_publications(&self) -> RepoResult<u64>;
    async fn list_user_publications(&self, user_id: Uuid) -> RepoResult<Vec<Publication>>;

    // --- Markers ---
    async fn insert_marker(&self, marker: &Marker) -> RepoResult<()>;
    async fn get_marker(&self, id: Uuid) -> RepoResult<Option<Marker>>;
    async fn save_marker(&self, marker: &Marker) -> RepoResult<()>;
    async fn delete_marker(&self, id: Uuid) -> RepoResult<bool>;
    async fn list_markers(&self) -> RepoResult<Vec<Marker>>;
    async fn list_user_markers(&self, user_id: Uuid) -> RepoResult<Vec<Marker>>;

    // --- Employees ---
    async fn insert_employee(&self, employee: &Employee) -> RepoResult<()>;
    async fn get_employee(&self, id: Uuid) -> RepoResult<Option<Employee>>;
    async fn find_employee_by_email(&self, email: &str) -> RepoResult<Option<Employee>>;
    async fn save_employee(&self, employee: &Employee) -> RepoResult<()>;
    async fn delete_employee(&self, id: Uuid) -> RepoResult<bool>;
    async fn list_employees(&self) -> RepoResult<Vec<Employee>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
