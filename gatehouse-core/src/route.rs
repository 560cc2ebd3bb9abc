use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single entry in the routing table: a normalized path prefix paired
/// with an upstream origin and caller-supplied metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    /// Normalized prefix, primary key. Always starts with `/`; never ends
    /// with `/` except for the root prefix `/` itself.
    pub prefix: String,

    /// Absolute upstream origin URL (`http://` or `ws://`), no trailing slash.
    pub target: String,

    /// Set on creation, reset on every full replacement. Monotonic per route.
    pub last_activity: DateTime<Utc>,

    /// Arbitrary caller-supplied metadata, round-tripped verbatim.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Route {
    pub fn new(prefix: String, target: String, data: Map<String, Value>) -> Self {
        Self {
            prefix,
            target,
            last_activity: Utc::now(),
            data,
        }
    }

    /// Merge `data` into this route's metadata; caller-supplied keys win.
    pub fn merge_data(&mut self, data: Map<String, Value>) {
        for (k, v) in data {
            self.data.insert(k, v);
        }
    }
}

/// Body accepted by `POST`/`PUT /api/routes/<prefix>`.
///
/// `target` is required — a body that omits it is rejected with 400
/// (spec's Open Question on target-less PUTs is resolved that way).
#[derive(Debug, Clone, Deserialize)]
pub struct RouteUpdate {
    pub target: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_route_stamps_last_activity() {
        let before = Utc::now();
        let route = Route::new("/hello".into(), "http://127.0.0.1:9000".into(), Map::new());
        assert!(route.last_activity >= before);
    }

    #[test]
    fn merge_data_overwrites_existing_keys_only() {
        let mut route = Route::new("/a".into(), "http://x".into(), Map::new());
        route.data.insert("user".into(), Value::String("alice".into()));
        route.data.insert("keep".into(), Value::String("me".into()));

        let mut incoming = Map::new();
        incoming.insert("user".into(), Value::String("bob".into()));
        route.merge_data(incoming);

        assert_eq!(route.data["user"], Value::String("bob".into()));
        assert_eq!(route.data["keep"], Value::String("me".into()));
    }

    #[test]
    fn route_update_rejects_missing_target() {
        let body = serde_json::json!({"data": {"user": "x"}});
        let parsed: Result<RouteUpdate, _> = serde_json::from_value(body);
        assert!(parsed.is_err());
    }

    #[test]
    fn route_update_collects_extra_fields_into_data() {
        let body = serde_json::json!({
            "target": "http://127.0.0.1:9001",
            "user": "alice",
            "server_name": "n1"
        });
        let parsed: RouteUpdate = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.target, "http://127.0.0.1:9001");
        assert_eq!(parsed.data["user"], Value::String("alice".into()));
        assert_eq!(parsed.data["server_name"], Value::String("n1".into()));
    }

    #[test]
    fn route_serializes_last_activity_as_iso8601() {
        let route = Route::new("/".into(), "http://x".into(), Map::new());
        let json = serde_json::to_value(&route).unwrap();
        let ts = json["last_activity"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
