use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository};
use crate::models::{
    Comment, Employee, Location, Marker, MediaAttachment, Publication, PublicationKind, User,
    UserStatus, Visibility,
};

const USER_COLUMNS: &str = "id, email, name, password_hash, profile_image, is_verified, status, otp, otp_expires, created_at";
const EMPLOYEE_COLUMNS: &str = "id, name, email, phone, face_image, certificate, start_date, end_date, certificate_start_date, certificate_end_date, created_at, updated_at";
const PUBLICATION_COLUMNS: &str = "id, user_id, content, kind, media, location, tags, category, visibility, likes, comments, is_active, created_at, updated_at";
const MARKER_COLUMNS: &str = "id, user_id, latitude, longitude, title, comment, color, photos, videos, created_at, updated_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Uses the runtime query API
/// with `FromRow` rows so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded `migrations/` directory.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a unique violation to `Duplicate(what)`; everything else stays a database error.
fn unique_as_duplicate(err: sqlx::Error, what: &str) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepoError::Duplicate(what.to_string());
        }
    }
    RepoError::Database(err)
}

// --- Row types ---

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    profile_image: String,
    is_verified: bool,
    status: String,
    otp: Option<String>,
    otp_expires: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let status = UserStatus::parse(&row.status)
            .ok_or_else(|| RepoError::Corrupt(format!("user status `{}`", row.status)))?;
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            profile_image: row.profile_image,
            is_verified: row.is_verified,
            status,
            otp: row.otp,
            otp_expires: row.otp_expires,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct EmployeeRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    face_image: String,
    certificate: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    certificate_start_date: Option<DateTime<Utc>>,
    certificate_end_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            face_image: row.face_image,
            certificate: row.certificate,
            start_date: row.start_date,
            end_date: row.end_date,
            certificate_start_date: row.certificate_start_date,
            certificate_end_date: row.certificate_end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PublicationRow {
    id: Uuid,
    user_id: Uuid,
    content: String,
    kind: String,
    media: Json<Vec<MediaAttachment>>,
    location: Option<Json<Location>>,
    tags: Json<Vec<String>>,
    category: Option<String>,
    visibility: String,
    likes: Json<Vec<Uuid>>,
    comments: Json<Vec<Comment>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PublicationRow> for Publication {
    type Error = RepoError;

    fn try_from(row: PublicationRow) -> Result<Self, Self::Error> {
        let kind = PublicationKind::parse(&row.kind)
            .ok_or_else(|| RepoError::Corrupt(format!("publication kind `{}`", row.kind)))?;
        let visibility = Visibility::parse(&row.visibility)
            .ok_or_else(|| RepoError::Corrupt(format!("visibility `{}`", row.visibility)))?;
        Ok(Publication {
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            kind,
            media: row.media.0,
            location: row.location.map(|l| l.0),
            tags: row.tags.0,
            category: row.category,
            visibility,
            likes: row.likes.0,
            comments: row.comments.0,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MarkerRow {
    id: Uuid,
    user_id: Uuid,
    latitude: f64,
    longitude: f64,
    title: String,
    comment: String,
    color: String,
    photos: Json<Vec<String>>,
    videos: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MarkerRow> for Marker {
    fn from(row: MarkerRow) -> Self {
        Marker {
            id: row.id,
            user_id: row.user_id,
            latitude: row.latitude,
            longitude: row.longitude,
            title: row.title,
            comment: row.comment,
            color: row.color,
            photos: row.photos.0,
            videos: row.videos.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn users_from(rows: Vec<UserRow>) -> RepoResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

fn publications_from(rows: Vec<PublicationRow>) -> RepoResult<Vec<Publication>> {
    rows.into_iter().map(Publication::try_from).collect()
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, profile_image, is_verified, status, otp, otp_expires, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.profile_image)
        .bind(user.is_verified)
        .bind(user.status.as_str())
        .bind(&user.otp)
        .bind(user.otp_expires)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_duplicate(e, "Email"))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, UserRow>(&query)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        users_from(rows)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, UserRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        users_from(rows)
    }

    async fn list_notification_recipients(&self, operator_emails: &[String]) -> RepoResult<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE status = 'admin' OR lower(email) = ANY($1)"
        );
        let rows = sqlx::query_as::<_, UserRow>(&query)
            .bind(operator_emails.to_vec())
            .fetch_all(&self.pool)
            .await?;
        users_from(rows)
    }

    async fn save_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            "UPDATE users SET email = $2, name = $3, password_hash = $4, profile_image = $5, \
             is_verified = $6, status = $7, otp = $8, otp_expires = $9 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.profile_image)
        .bind(user.is_verified)
        .bind(user.status.as_str())
        .bind(&user.otp)
        .bind(user.otp_expires)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_duplicate(e, "Email"))?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- PUBLICATIONS ---

    async fn insert_publication(&self, p: &Publication) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO publications (id, user_id, content, kind, media, location, tags, category, visibility, likes, comments, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(p.id)
        .bind(p.user_id)
        .bind(&p.content)
        .bind(p.kind.as_str())
        .bind(Json(&p.media))
        .bind(p.location.as_ref().map(Json))
        .bind(Json(&p.tags))
        .bind(&p.category)
        .bind(p.visibility.as_str())
        .bind(Json(&p.likes))
        .bind(Json(&p.comments))
        .bind(p.is_active)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_publication(&self, id: Uuid) -> RepoResult<Option<Publication>> {
        let query = format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = $1");
        sqlx::query_as::<_, PublicationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Publication::try_from)
            .transpose()
    }

    /// save_publication
    ///
    /// Writes the aggregate in one UPDATE. `likes` and `comments` are left alone; they
    /// only move through the atomic statements below.
    async fn save_publication(&self, p: &Publication) -> RepoResult<()> {
        sqlx::query(
            "UPDATE publications SET content = $2, kind = $3, media = $4, location = $5, tags = $6, \
             category = $7, visibility = $8, is_active = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(p.id)
        .bind(&p.content)
        .bind(p.kind.as_str())
        .bind(Json(&p.media))
        .bind(p.location.as_ref().map(Json))
        .bind(Json(&p.tags))
        .bind(&p.category)
        .bind(p.visibility.as_str())
        .bind(p.is_active)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// toggle_like
    ///
    /// Flips membership in the JSONB array inside the UPDATE itself, so concurrent likes
    /// on one row serialize on the row lock instead of overwriting each other.
    async fn toggle_like(&self, id: Uuid, user_id: Uuid) -> RepoResult<Option<Publication>> {
        let query = format!(
            "UPDATE publications SET likes = CASE \
               WHEN likes @> $2 THEN COALESCE( \
                 (SELECT jsonb_agg(e) FROM jsonb_array_elements(likes) AS e WHERE e <> $3), '[]'::jsonb) \
               ELSE likes || $2 END \
             WHERE id = $1 AND is_active = TRUE \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        sqlx::query_as::<_, PublicationRow>(&query)
            .bind(id)
            .bind(Json([user_id]))
            .bind(Json(user_id))
            .fetch_optional(&self.pool)
            .await?
            .map(Publication::try_from)
            .transpose()
    }

    async fn append_comment(&self, id: Uuid, comment: &Comment) -> RepoResult<Option<Publication>> {
        let query = format!(
            "UPDATE publications SET comments = comments || $2 \
             WHERE id = $1 AND is_active = TRUE \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        sqlx::query_as::<_, PublicationRow>(&query)
            .bind(id)
            .bind(Json([comment]))
            .fetch_optional(&self.pool)
            .await?
            .map(Publication::try_from)
            .transpose()
    }

    async fn list_active_publications(&self, offset: u64, limit: u64) -> RepoResult<Vec<Publication>> {
        let query = format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE is_active = TRUE \
             ORDER BY created_at DESC OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, PublicationRow>(&query)
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        publications_from(rows)
    }

    async fn count_active_publications(&self) -> RepoResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM publications WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list_user_publications(&self, user_id: Uuid) -> RepoResult<Vec<Publication>> {
        let query = format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE user_id = $1 AND is_active = TRUE \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, PublicationRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        publications_from(rows)
    }

    // --- MARKERS ---

    async fn insert_marker(&self, m: &Marker) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO markers (id, user_id, latitude, longitude, title, comment, color, photos, videos, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(m.id)
        .bind(m.user_id)
        .bind(m.latitude)
        .bind(m.longitude)
        .bind(&m.title)
        .bind(&m.comment)
        .bind(&m.color)
        .bind(Json(&m.photos))
        .bind(Json(&m.videos))
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_marker(&self, id: Uuid) -> RepoResult<Option<Marker>> {
        let query = format!("SELECT {MARKER_COLUMNS} FROM markers WHERE id = $1");
        let row = sqlx::query_as::<_, MarkerRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Marker::from))
    }

    async fn save_marker(&self, m: &Marker) -> RepoResult<()> {
        sqlx::query(
            "UPDATE markers SET latitude = $2, longitude = $3, title = $4, comment = $5, color = $6, \
             photos = $7, videos = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(m.id)
        .bind(m.latitude)
        .bind(m.longitude)
        .bind(&m.title)
        .bind(&m.comment)
        .bind(&m.color)
        .bind(Json(&m.photos))
        .bind(Json(&m.videos))
        .bind(m.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_marker(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM markers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_markers(&self) -> RepoResult<Vec<Marker>> {
        let query = format!("SELECT {MARKER_COLUMNS} FROM markers ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, MarkerRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Marker::from).collect())
    }

    async fn list_user_markers(&self, user_id: Uuid) -> RepoResult<Vec<Marker>> {
        let query =
            format!("SELECT {MARKER_COLUMNS} FROM markers WHERE user_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, MarkerRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Marker::from).collect())
    }

    // --- EMPLOYEES ---

    async fn insert_employee(&self, e: &Employee) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO employees (id, name, email, phone, face_image, certificate, start_date, end_date, certificate_start_date, certificate_end_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(e.id)
        .bind(&e.name)
        .bind(&e.email)
        .bind(&e.phone)
        .bind(&e.face_image)
        .bind(&e.certificate)
        .bind(e.start_date)
        .bind(e.end_date)
        .bind(e.certificate_start_date)
        .bind(e.certificate_end_date)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_as_duplicate(err, "Email"))?;
        Ok(())
    }

    async fn get_employee(&self, id: Uuid) -> RepoResult<Option<Employee>> {
        let query = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1");
        let row = sqlx::query_as::<_, EmployeeRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Employee::from))
    }

    async fn find_employee_by_email(&self, email: &str) -> RepoResult<Option<Employee>> {
        let query = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = $1");
        let row = sqlx::query_as::<_, EmployeeRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Employee::from))
    }

    async fn save_employee(&self, e: &Employee) -> RepoResult<()> {
        sqlx::query(
            "UPDATE employees SET name = $2, email = $3, phone = $4, face_image = $5, certificate = $6, \
             start_date = $7, end_date = $8, certificate_start_date = $9, certificate_end_date = $10, \
             updated_at = $11 WHERE id = $1",
        )
        .bind(e.id)
        .bind(&e.name)
        .bind(&e.email)
        .bind(&e.phone)
        .bind(&e.face_image)
        .bind(&e.certificate)
        .bind(e.start_date)
        .bind(e.end_date)
        .bind(e.certificate_start_date)
        .bind(e.certificate_end_date)
        .bind(e.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_as_duplicate(err, "Email"))?;
        Ok(())
    }

    async fn delete_employee(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        let query = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, EmployeeRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Employee::from).collect())
    }
}
