use std::sync::Arc;

use gatehouse_core::error::GatehouseError;
use gatehouse_core::normalize::normalize_path;
use gatehouse_core::route::Route;
use gatehouse_core::store::Store;

use crate::activity::ActivityRecorder;

/// C2: the coordinator the proxy engine and management API both sit on
/// top of. Grounded on the teacher's `ando-core::router::Router` role —
/// "the thing every request is matched against" — but the matching
/// algorithm itself is delegated to `Store::get_target` rather than
/// compiled into a `matchit` radix tree, since spec.md's routing rule is
/// longest-prefix-of-path, not a path-template router with host/method
/// constraints (spec.md §4.1, §9).
pub struct Router {
    store: Arc<dyn Store>,
    activity: ActivityRecorder,
}

impl Router {
    pub fn new(store: Arc<dyn Store>, activity: ActivityRecorder) -> Self {
        Self { store, activity }
    }

    /// Normalize `raw_path`, find the longest-matching route, and fire a
    /// best-effort activity-timestamp update. Returns `NoRouteMatched` if
    /// nothing matches — callers decide whether a configured
    /// `default_target` applies instead (spec.md §4.1).
    pub async fn resolve(&self, raw_path: &str) -> Result<Route, GatehouseError> {
        let path = normalize_path(raw_path);
        match self.store.get_target(&path).await? {
            Some(route) => {
                self.activity.touch(route.prefix.clone());
                Ok(route)
            }
            None => Err(GatehouseError::NoRouteMatched(path)),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
