use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod mailer;
pub mod media;
pub mod models;
pub mod network;
pub mod otp;
pub mod repository;
pub mod storage;
pub mod views;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::SessionIssuer;
pub use config::AppConfig;
pub use mailer::MailerState;
pub use media::MediaManager;
pub use network::ServerInfo;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// Request bodies may carry ten 50 MB videos plus form fields.
pub const MAX_BODY_BYTES: usize = 600 * 1024 * 1024;

/// ApiDoc
///
/// Generated OpenAPI document, served at `/api-docs/openapi.json` with Swagger UI on
/// `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::login, handlers::auth::verify_otp,
        handlers::auth::refresh_token,
        handlers::profile::update_name, handlers::profile::change_password,
        handlers::profile::upload_profile_image, handlers::profile::delete_profile_image,
        handlers::profile::delete_account,
        handlers::publications::create_publication, handlers::publications::list_publications,
        handlers::publications::list_user_publications, handlers::publications::get_publication,
        handlers::publications::update_publication, handlers::publications::delete_publication,
        handlers::publications::toggle_like, handlers::publications::list_comments,
        handlers::publications::add_comment, handlers::publications::delete_media,
        handlers::markers::create_marker, handlers::markers::list_markers,
        handlers::markers::list_user_markers, handlers::markers::get_marker,
        handlers::markers::update_marker, handlers::markers::delete_marker,
        handlers::markers::delete_marker_media,
        handlers::employees::list_employees, handlers::employees::create_employee,
        handlers::employees::update_employee, handlers::employees::delete_employee,
        handlers::users::list_users, handlers::users::update_user_status,
        handlers::users::delete_user,
        handlers::server::server_info
    ),
    components(
        schemas(
            models::RegisterRequest, models::LoginRequest, models::VerifyOtpRequest,
            models::RefreshTokenRequest, models::UpdateNameRequest, models::ChangePasswordRequest,
            models::CreateCommentRequest, models::UpdateStatusRequest, models::PublicationForm,
            models::MarkerForm, models::EmployeeForm, models::ProfileImageForm,
            models::UserStatus, models::PublicationKind, models::Visibility, models::MediaKind,
            models::Location,
            views::OwnerSummary, views::UserView, views::MediaView, views::CommentView,
            views::PublicationView, views::MarkerView, views::EmployeeView,
            views::MessageResponse, views::SessionResponse, views::AccessTokenResponse,
            views::UserResponse, views::UsersResponse, views::ProfileImageResponse,
            views::PublicationResponse, views::Pagination, views::PublicationPage,
            views::PublicationList, views::LikeResponse, views::CommentList,
            views::CommentResponse, views::MediaListResponse, views::MarkerResponse,
            views::MarkerList, views::EmployeeResponse, views::EmployeeList,
            network::ServerInfoResponse,
        )
    ),
    tags(
        (name = "geosocial", description = "Publications, markers and employee registry API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Unified, immutable application state shared by every request. Handlers take the
/// whole state or pull single components through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    /// Disk store for uploads (mocked in tests).
    pub storage: StorageState,
    pub mailer: MailerState,
    pub sessions: SessionIssuer,
    /// Host and base URL, resolved once at startup.
    pub server: Arc<ServerInfo>,
    pub config: AppConfig,
}

impl AppState {
    pub fn media(&self) -> MediaManager {
        MediaManager::new(self.storage.clone())
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for SessionIssuer {
    fn from_ref(app_state: &AppState) -> SessionIssuer {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated and admin subtrees. Resolving `AuthUser` rejects missing
/// (401), expired or invalid (403) tokens before the handler runs; on success the
/// identity is stored in the request extensions so handlers reuse it without decoding
/// the token again.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies global and scoped middleware, and registers
/// the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // Uploaded files are served read-only from `<storage_root>/uploads`.
    let uploads = ServeDir::new(state.config.storage_root.join("uploads"));

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: bearer token required.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin Routes: bearer token here, operator gate inside each handler.
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header, so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
