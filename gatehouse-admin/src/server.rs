use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router as AxumRouter;
use gatehouse_core::Store;

use crate::handlers::routes;
use crate::middleware::require_bearer_token;

/// Shared state for the management API, grounded on the teacher's
/// `ando-admin::server::AppState`. Admin operates directly on the `Store`
/// rather than through `gatehouse_router::Router`, since the management
/// surface reads and writes the table itself and has no need for the
/// activity-recorder's longest-prefix resolution path.
pub struct AdminState {
    pub store: Arc<dyn Store>,
    pub auth_token: Option<String>,
}

/// Assemble the `/api/routes` surface, grounded on
/// `ando-admin::server::AdminServer::build_router`: routes registered on a
/// bare router, state attached last, auth middleware wrapping the whole
/// thing rather than each handler individually.
pub fn build_admin_router(state: Arc<AdminState>) -> AxumRouter {
    AxumRouter::new()
        .route("/api/routes", get(routes::list_routes))
        .route("/api/routes/{*prefix}", get(routes::get_route))
        .route("/api/routes/{*prefix}", post(routes::upsert_route))
        .route("/api/routes/{*prefix}", put(routes::upsert_route))
        .route("/api/routes/{*prefix}", delete(routes::delete_route))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ))
        .with_state(state)
}
