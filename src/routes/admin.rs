use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Employee registry and user management. Access is granted to accounts with the
/// `admin` status and to the emails listed in `PRIVILEGED_OPERATORS`; the check is the
/// `PrivilegedOperator` extractor on each handler. Accounts on that allowlist cannot
/// have their status changed or be deleted through these routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /api/employees
        // POST is multipart with optional `faceImage` and `certificate` files and
        // notifies every operator by email once the record is stored.
        .route(
            "/api/employees",
            get(handlers::employees::list_employees).post(handlers::employees::create_employee),
        )
        // PUT/DELETE /api/employees/{id}
        // Replaced or deleted records take their files with them.
        .route(
            "/api/employees/{id}",
            put(handlers::employees::update_employee).delete(handlers::employees::delete_employee),
        )
        // GET /api/users
        .route("/api/users", get(handlers::users::list_users))
        // PUT /api/users/{id}/status
        // `active`, `blocked` or `admin`.
        .route("/api/users/{id}/status", put(handlers::users::update_user_status))
        // DELETE /api/users/{id}
        .route("/api/users/{id}", axum::routing::delete(handlers::users::delete_user))
}
