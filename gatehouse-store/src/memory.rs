use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use gatehouse_core::error::GatehouseError;
use gatehouse_core::normalize::ancestor_prefixes;
use gatehouse_core::route::Route;
use gatehouse_core::store::{RoutePatch, Store};
use serde_json::Map;

/// In-memory `Store`, grounded on the teacher's `ConfigCache`
/// (`ando-store/src/cache.rs`): a single `DashMap` keyed by normalized
/// prefix. Longest-prefix lookup walks the request path's ancestor
/// prefixes from longest to shortest (spec.md §4.1's "walking segments"
/// option) rather than scanning every stored key.
#[derive(Default)]
pub struct MemoryStore {
    routes: DashMap<String, Route>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_target(&self, path: &str) -> Result<Option<Route>, GatehouseError> {
        for candidate in ancestor_prefixes(path) {
            if let Some(route) = self.routes.get(&candidate) {
                return Ok(Some(route.clone()));
            }
        }
        Ok(None)
    }

    async fn get(&self, prefix: &str) -> Result<Option<Route>, GatehouseError> {
        Ok(self.routes.get(prefix).map(|r| r.clone()))
    }

    async fn get_all(&self) -> Result<HashMap<String, Route>, GatehouseError> {
        Ok(self
            .routes
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect())
    }

    async fn add(
        &self,
        prefix: &str,
        target: &str,
        data: Map<String, serde_json::Value>,
    ) -> Result<Route, GatehouseError> {
        let route = match self.routes.get(prefix) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.target = target.to_string();
                updated.merge_data(data);
                updated.last_activity = chrono::Utc::now();
                updated
            }
            None => Route::new(prefix.to_string(), target.to_string(), data),
        };
        self.routes.insert(prefix.to_string(), route.clone());
        Ok(route)
    }

    async fn update(&self, prefix: &str, partial: RoutePatch) -> Result<(), GatehouseError> {
        let mut entry = self
            .routes
            .get_mut(prefix)
            .ok_or_else(|| GatehouseError::NotFound(prefix.to_string()))?;
        if let Some(ts) = partial.last_activity {
            if ts > entry.last_activity {
                entry.last_activity = ts;
            }
        }
        Ok(())
    }

    async fn remove(&self, prefix: &str) -> Result<(), GatehouseError> {
        self.routes.remove(prefix);
        Ok(())
    }
}
