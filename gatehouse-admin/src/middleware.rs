use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gatehouse_core::error::GatehouseError;

use crate::server::AdminState;

/// Bearer-token authentication, spec.md §4.4: every request must carry
/// `Authorization: token <AUTH_TOKEN>`; missing, malformed, or mismatched
/// → 403. Unlike the teacher's `ando-admin::middleware::api_key_auth`
/// (which is a TODO stub that always calls `next.run` regardless of
/// `state`), this is the enforcing version the teacher's own comment says
/// production deployments need — and it applies even when no token is
/// configured: with nothing to match, every request is rejected rather
/// than waved through.
pub async fn require_bearer_token(
    State(state): State<Arc<AdminState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("token "));

    match (&state.auth_token, provided) {
        (Some(expected), Some(actual)) if constant_time_eq(expected.as_bytes(), actual.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            let err = GatehouseError::AuthFailed;
            (StatusCode::FORBIDDEN, err.to_json_body()).into_response()
        }
    }
}

/// Byte-for-byte comparison that runs in time independent of where the
/// first mismatch falls, so a timing attack can't binary-search the
/// configured token one byte at a time. Unequal lengths short-circuit —
/// leaking a length isn't the guarantee spec.md asks for here.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_admin_router;
    use axum::body::Body as AxumBody;
    use axum::http::Request as AxumRequest;
    use gatehouse_core::store::Store;
    use gatehouse_store::MemoryStore;
    use tower::ServiceExt;

    fn state_with_token(token: Option<&str>) -> Arc<AdminState> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        Arc::new(AdminState {
            store,
            auth_token: token.map(|t| t.to_string()),
        })
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let app = build_admin_router(state_with_token(Some("secret")));
        let req = AxumRequest::builder()
            .uri("/api/routes")
            .body(AxumBody::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let app = build_admin_router(state_with_token(Some("secret")));
        let req = AxumRequest::builder()
            .uri("/api/routes")
            .header("authorization", "token wrong")
            .body(AxumBody::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn correct_token_is_accepted() {
        let app = build_admin_router(state_with_token(Some("secret")));
        let req = AxumRequest::builder()
            .uri("/api/routes")
            .header("authorization", "token secret")
            .body(AxumBody::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn no_configured_token_rejects_everything() {
        let app = build_admin_router(state_with_token(None));
        let req = AxumRequest::builder()
            .uri("/api/routes")
            .header("authorization", "token anything")
            .body(AxumBody::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn constant_time_eq_matches_string_equality() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
        assert!(!constant_time_eq(b"secret", b"wrong!"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[tokio::test]
    async fn bearer_scheme_instead_of_token_scheme_is_rejected() {
        let app = build_admin_router(state_with_token(Some("secret")));
        let req = AxumRequest::builder()
            .uri("/api/routes")
            .header("authorization", "Bearer secret")
            .body(AxumBody::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
