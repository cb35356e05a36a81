use axum::{Json, extract::State};

use crate::{AppState, network::ServerInfoResponse};

/// server_info
///
/// Public. Lets clients discover the base URL that media links are built on.
#[utoipa::path(
    get,
    path = "/api/server-info",
    responses((status = 200, description = "Resolved host and base URL", body = ServerInfoResponse))
)]
pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(state.server.snapshot())
}
