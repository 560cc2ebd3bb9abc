use chrono::Utc;
use serde::Serialize;

/// Structured access log entry, grounded on the teacher's
/// `ando-observability::access_log::AccessLogEntry`. Emitted as a single
/// `tracing::info!` event — this repo has no VictoriaLogs (or other
/// external sink) to push to, so the entry is the log line itself rather
/// than a payload shipped off-process.
#[derive(Debug, Serialize)]
pub struct AccessLogEntry {
    pub timestamp: String,
    pub prefix: Option<String>,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: f64,
    pub upstream_target: Option<String>,
}

impl AccessLogEntry {
    pub fn new(
        prefix: Option<String>,
        client_ip: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        latency_ms: f64,
        upstream_target: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            prefix,
            client_ip: client_ip.into(),
            method: method.into(),
            path: path.into(),
            status,
            latency_ms,
            upstream_target,
        }
    }

    /// Emit this entry as a structured `tracing` event at `info` level.
    pub fn emit(&self) {
        tracing::info!(
            target: "gatehouse::access",
            timestamp = %self.timestamp,
            prefix = self.prefix.as_deref().unwrap_or(""),
            client_ip = %self.client_ip,
            method = %self.method,
            path = %self.path,
            status = self.status,
            latency_ms = self.latency_ms,
            upstream_target = self.upstream_target.as_deref().unwrap_or(""),
            "request handled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_iso8601_timestamp() {
        let entry = AccessLogEntry::new(
            Some("/api".to_string()),
            "127.0.0.1",
            "GET",
            "/api/users",
            200,
            1.23,
            Some("http://127.0.0.1:9000".to_string()),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
        assert_eq!(json["status"], 200);
    }

    #[test]
    fn entry_does_not_panic_without_a_matched_route() {
        let entry = AccessLogEntry::new(None, "10.0.0.1", "GET", "/nope", 404, 0.5, None);
        entry.emit();
    }
}
