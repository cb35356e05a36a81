use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the bearer-token layer. Ownership of publications
/// and markers is checked inside the handlers (403 for anyone but the owner).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        .route("/api/user/update-name", put(handlers::profile::update_name))
        .route("/api/user/change-password", put(handlers::profile::change_password))
        // Multipart `profileImage`; replaces (and removes) the previous picture.
        .route(
            "/api/user/upload-profile-image",
            post(handlers::profile::upload_profile_image),
        )
        .route(
            "/api/user/delete-profile-image",
            delete(handlers::profile::delete_profile_image),
        )
        .route("/api/user/delete-account", delete(handlers::profile::delete_account))
        // --- Publications ---
        // GET is paged with `page` / `limit`; POST is multipart with up to 10 `media`.
        .route(
            "/api/publications",
            post(handlers::publications::create_publication)
                .get(handlers::publications::list_publications),
        )
        .route(
            "/api/publications/user/{user_id}",
            get(handlers::publications::list_user_publications),
        )
        .route(
            "/api/publications/{id}",
            get(handlers::publications::get_publication)
                .put(handlers::publications::update_publication)
                .delete(handlers::publications::delete_publication),
        )
        .route(
            "/api/publications/{id}/like",
            post(handlers::publications::toggle_like),
        )
        .route(
            "/api/publications/{id}/comments",
            get(handlers::publications::list_comments).post(handlers::publications::add_comment),
        )
        .route(
            "/api/publications/{id}/media/{media_index}",
            delete(handlers::publications::delete_media),
        )
        // --- Markers ---
        // Multipart `photos` (up to 10) and `videos` (up to 5).
        .route(
            "/api/markers",
            post(handlers::markers::create_marker).get(handlers::markers::list_markers),
        )
        .route(
            "/api/markers/user/{user_id}",
            get(handlers::markers::list_user_markers),
        )
        .route(
            "/api/markers/{id}",
            get(handlers::markers::get_marker)
                .put(handlers::markers::update_marker)
                .delete(handlers::markers::delete_marker),
        )
        .route(
            "/api/markers/{id}/media/{media_type}/{index}",
            delete(handlers::markers::delete_marker_media),
        )
}
