use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Map;

use crate::error::GatehouseError;
use crate::route::Route;

/// C1: the persistence interface every storage backend implements.
///
/// Implementations must be internally synchronized so that `get_target`
/// observes either the pre-state or the post-state of any concurrent
/// `add`/`update`/`remove` — never a partial state (spec.md §5).
#[async_trait]
pub trait Store: Send + Sync {
    /// The record whose prefix is the longest prefix of `path`, or `None`.
    /// `path` is expected to already be normalized.
    async fn get_target(&self, path: &str) -> Result<Option<Route>, GatehouseError>;

    /// The record stored at exactly `prefix`, or `None`.
    async fn get(&self, prefix: &str) -> Result<Option<Route>, GatehouseError>;

    /// Every record, keyed by prefix.
    async fn get_all(&self) -> Result<HashMap<String, Route>, GatehouseError>;

    /// Insert a new record, or replace `target` and merge `data` into an
    /// existing one. On replacement `last_activity` resets to now.
    async fn add(&self, prefix: &str, target: &str, data: Map<String, serde_json::Value>)
        -> Result<Route, GatehouseError>;

    /// Merge fields into an existing record. Fails with `NotFound` if the
    /// prefix is absent. Used internally for activity-timestamp bumps.
    async fn update(&self, prefix: &str, partial: RoutePatch) -> Result<(), GatehouseError>;

    /// Delete a record. Idempotent: absent prefixes are not an error.
    async fn remove(&self, prefix: &str) -> Result<(), GatehouseError>;
}

/// Partial update applied by `Store::update`. All fields optional; only
/// `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct RoutePatch {
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
}

impl RoutePatch {
    pub fn touch_now() -> Self {
        Self {
            last_activity: Some(chrono::Utc::now()),
        }
    }
}
