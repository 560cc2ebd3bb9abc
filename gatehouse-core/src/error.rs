use thiserror::Error;

/// Unified error type for Gatehouse, matching the taxonomy in spec.md §7.
#[derive(Error, Debug)]
pub enum GatehouseError {
    #[error("no route matched: {0}")]
    NoRouteMatched(String),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream timed out before first byte: {0}")]
    UpstreamTimeout(String),

    #[error("upstream aborted mid-stream: {0}")]
    UpstreamAborted(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("auth failed")]
    AuthFailed,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("route not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl GatehouseError {
    /// Map to the HTTP status code the management API (or data plane, via
    /// the error handler) should emit for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatehouseError::NoRouteMatched(_) => 404,
            GatehouseError::NotFound(_) => 404,
            GatehouseError::UpstreamUnreachable(_) => 503,
            GatehouseError::UpstreamTimeout(_) => 504,
            GatehouseError::UpstreamAborted(_) => 502,
            GatehouseError::BadRequest(_) => 400,
            GatehouseError::AuthFailed => 403,
            GatehouseError::StoreError(_) => 500,
            GatehouseError::Io(_) => 500,
            GatehouseError::Serde(_) => 400,
        }
    }

    /// JSON error body for the management API.
    pub fn to_json_body(&self) -> Vec<u8> {
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": self.status_code(),
        });
        serde_json::to_vec(&body).unwrap_or_else(|_| b"{\"error\":\"internal\"}".to_vec())
    }
}
