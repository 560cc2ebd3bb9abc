use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use gatehouse_core::normalize::normalize_prefix;
use gatehouse_core::route::RouteUpdate;
use gatehouse_core::GatehouseError;
use serde::Deserialize;
use serde_json::Value;

use crate::server::AdminState;

fn err_response(err: GatehouseError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_json_body()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub inactive_since: Option<String>,
}

/// `GET /api/routes`, spec.md §4.4. Optionally filters to routes whose
/// `last_activity` is strictly before the given RFC3339 timestamp —
/// grounded on `ando-admin::handlers::routes::list_routes`'s response
/// shape (a bare JSON object keyed by prefix).
pub async fn list_routes(
    State(state): State<Arc<AdminState>>,
    Query(params): Query<ListParams>,
) -> Response {
    let routes = match state.store.get_all().await {
        Ok(routes) => routes,
        Err(e) => return err_response(e),
    };

    let cutoff: Option<DateTime<Utc>> = match params.inactive_since {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(_) => {
                return err_response(GatehouseError::BadRequest(format!(
                    "invalid inactive_since timestamp: {raw}"
                )))
            }
        },
        None => None,
    };

    let mut body = serde_json::Map::new();
    for (prefix, route) in routes {
        if let Some(cutoff) = cutoff {
            if route.last_activity >= cutoff {
                continue;
            }
        }
        body.insert(prefix, serde_json::to_value(&route).unwrap_or(Value::Null));
    }

    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

/// `GET /api/routes/<prefix>`.
pub async fn get_route(State(state): State<Arc<AdminState>>, Path(prefix): Path<String>) -> Response {
    let prefix = normalize_prefix(&prefix);
    match state.store.get(&prefix).await {
        Ok(Some(route)) => (StatusCode::OK, Json(route)).into_response(),
        Ok(None) => err_response(GatehouseError::NotFound(prefix)),
        Err(e) => err_response(e),
    }
}

/// `POST`/`PUT /api/routes/<prefix>`: upsert, same handler for both verbs
/// per spec.md §4.4 (`PUT` is documented as an alias of `POST`).
///
/// The body is parsed by hand rather than via the `Json<RouteUpdate>`
/// extractor so that a malformed body produces the same
/// `GatehouseError`-shaped JSON error as every other failure mode here,
/// instead of axum's generic rejection body.
pub async fn upsert_route(
    State(state): State<Arc<AdminState>>,
    Path(prefix): Path<String>,
    body: axum::body::Bytes,
) -> Response {
    let prefix = normalize_prefix(&prefix);

    let update: RouteUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => return err_response(GatehouseError::BadRequest(e.to_string())),
    };

    match state
        .store
        .add(&prefix, &update.target, update.data)
        .await
    {
        Ok(route) => (StatusCode::CREATED, Json(route)).into_response(),
        Err(e) => err_response(e),
    }
}

/// `DELETE /api/routes/<prefix>`: idempotent, always 204.
pub async fn delete_route(
    State(state): State<Arc<AdminState>>,
    Path(prefix): Path<String>,
) -> Response {
    let prefix = normalize_prefix(&prefix);
    match state.store.remove(&prefix).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => err_response(e),
    }
}
