/// Router Module Index
///
/// Routing is split by access tier; the tier decides which guard runs before the
/// handler.

/// No credentials: the auth flow, server info and health.
pub mod public;

/// Wrapped in the bearer-token `route_layer` in `create_router`.
pub mod authenticated;

/// Employee registry and user management. Each handler takes a `PrivilegedOperator`,
/// which authenticates the caller and checks the operator gate.
pub mod admin;
