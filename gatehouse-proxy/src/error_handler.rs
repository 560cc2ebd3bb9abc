use std::path::PathBuf;
use std::time::Duration;

use gatehouse_core::config::ErrorHandlingConfig;
use tracing::warn;

/// A fully-built HTTP response ready to write to the client socket.
pub struct ErrorResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// C5: renders an error response for `status` following spec.md §4.5's
/// fixed precedence. Never consults the Router and never recurses — a
/// failure at one precedence level falls through to the next, it does not
/// re-enter `render`.
///
/// The `error_target` sub-request is built on `reqwest`, the same crate
/// the teacher uses for its VictoriaLogs push client
/// (`ando-observability/src/logger.rs`) and its active health-checker probe
/// client (`ando-proxy/src/health_check.rs`) — both are "make a bounded,
/// best-effort HTTP call and don't let its failure take down the caller"
/// uses, which is exactly the shape this needs.
pub struct ErrorHandler {
    client: reqwest::Client,
    error_target: Option<String>,
    error_path: Option<PathBuf>,
}

impl ErrorHandler {
    pub fn new(config: &ErrorHandlingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            error_target: config.error_target.clone(),
            error_path: config.error_path.clone(),
        }
    }

    pub async fn render(&self, status: u16, original_headers: &[(String, String)]) -> ErrorResponse {
        if let Some(target) = &self.error_target {
            if let Some(resp) = self.try_error_target(target, status, original_headers).await {
                return resp;
            }
        }

        if let Some(dir) = &self.error_path {
            if let Some(resp) = self.try_error_path(dir, status).await {
                return resp;
            }
        }

        Self::builtin_page(status)
    }

    async fn try_error_target(
        &self,
        target: &str,
        status: u16,
        original_headers: &[(String, String)],
    ) -> Option<ErrorResponse> {
        let url = format!("{}/{}", target.trim_end_matches('/'), status);
        let mut builder = self.client.get(&url);
        for (name, value) in original_headers {
            if crate::headers::is_hop_by_hop(name) {
                continue;
            }
            builder = builder.header(name, value);
        }

        match builder.send().await {
            Ok(resp) => {
                let relayed_status = resp.status().as_u16();
                let content_type = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("text/html; charset=utf-8")
                    .to_string();
                match resp.bytes().await {
                    Ok(body) => Some(ErrorResponse {
                        status: relayed_status,
                        content_type,
                        body: body.to_vec(),
                    }),
                    Err(e) => {
                        warn!(error = %e, %url, "error_target body read failed");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, %url, "error_target sub-request failed");
                None
            }
        }
    }

    async fn try_error_path(&self, dir: &PathBuf, status: u16) -> Option<ErrorResponse> {
        let specific = dir.join(format!("{status}.html"));
        if let Ok(body) = tokio::fs::read(&specific).await {
            return Some(ErrorResponse {
                status,
                content_type: "text/html; charset=utf-8".to_string(),
                body,
            });
        }

        let generic = dir.join("error.html");
        if let Ok(body) = tokio::fs::read(&generic).await {
            return Some(ErrorResponse {
                status,
                content_type: "text/html; charset=utf-8".to_string(),
                body,
            });
        }

        None
    }

    fn builtin_page(status: u16) -> ErrorResponse {
        let reason = crate::wire::status_text(status);
        let body = format!(
            "<html><head><title>{status} {reason}</title></head>\
             <body><h1>{status} {reason}</h1></body></html>"
        );
        ErrorResponse {
            status,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into_bytes(),
        }
    }
}
