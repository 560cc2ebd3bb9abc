use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_core::config::StorageConfig;
use gatehouse_core::store::Store;

use crate::memory::MemoryStore;
use crate::sql::SqlStore;

/// A store backend factory: given the resolved `StorageConfig`, build the
/// concrete `Store` and hand back a type-erased `Arc`.
#[async_trait::async_trait]
pub trait StoreFactory: Send + Sync {
    async fn build(&self, config: &StorageConfig) -> anyhow::Result<Arc<dyn Store>>;
}

struct MemoryFactory;

#[async_trait::async_trait]
impl StoreFactory for MemoryFactory {
    async fn build(&self, _config: &StorageConfig) -> anyhow::Result<Arc<dyn Store>> {
        Ok(Arc::new(MemoryStore::new()))
    }
}

struct SqlFactory;

#[async_trait::async_trait]
impl StoreFactory for SqlFactory {
    async fn build(&self, config: &StorageConfig) -> anyhow::Result<Arc<dyn Store>> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("storage.backend = \"database\" requires database_url (CHP_DATABASE_URL)"))?;
        let store = SqlStore::connect(url, &config.database_table).await?;
        Ok(Arc::new(store))
    }
}

/// Maps a short backend identifier (spec.md's redesigned substitute for
/// the original's dotted-path runtime class loading, see spec.md §9) to a
/// `StoreFactory`. Grounded on the teacher's `PluginRegistry`
/// (`ando-plugin/src/registry.rs`): a name-keyed map built once at
/// startup, `register`/`get`, last write wins on name collision. Applied
/// here to store backends instead of request-processing plugins — there
/// is no per-request dispatch, just a one-time lookup during startup.
pub struct StoreRegistry {
    factories: HashMap<String, Arc<dyn StoreFactory>>,
}

impl StoreRegistry {
    /// A registry pre-populated with the two backends spec.md names:
    /// `memory` and `database`.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("memory", Arc::new(MemoryFactory));
        registry.register("database", Arc::new(SqlFactory));
        registry
    }

    /// Register (or overwrite) a backend under `name`. Exposed so an
    /// embedder can add a backend this crate doesn't ship, matching the
    /// teacher's `register` semantics: last write wins.
    pub fn register(&mut self, name: &str, factory: Arc<dyn StoreFactory>) {
        tracing::info!(backend = %name, "registered store backend");
        self.factories.insert(name.to_string(), factory);
    }

    pub fn list(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub async fn build(&self, config: &StorageConfig) -> anyhow::Result<Arc<dyn Store>> {
        let factory = self.factories.get(config.backend.as_str()).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown storage backend \"{}\"; registered: {:?}",
                config.backend,
                self.list()
            )
        })?;
        factory.build(config).await
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_memory_backend_by_default() {
        let registry = StoreRegistry::with_builtins();
        let config = StorageConfig {
            backend: "memory".to_string(),
            database_url: None,
            database_table: "gatehouse_routes".to_string(),
        };
        let store = registry.build(&config).await.unwrap();
        assert!(store.get("/anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_backend_errors() {
        let registry = StoreRegistry::with_builtins();
        let config = StorageConfig {
            backend: "carrier-pigeon".to_string(),
            database_url: None,
            database_table: "gatehouse_routes".to_string(),
        };
        assert!(registry.build(&config).await.is_err());
    }

    #[tokio::test]
    async fn database_backend_without_url_errors() {
        let registry = StoreRegistry::with_builtins();
        let config = StorageConfig {
            backend: "database".to_string(),
            database_url: None,
            database_table: "gatehouse_routes".to_string(),
        };
        assert!(registry.build(&config).await.is_err());
    }

    #[tokio::test]
    async fn database_backend_with_sqlite_memory_url_builds() {
        let registry = StoreRegistry::with_builtins();
        let config = StorageConfig {
            backend: "database".to_string(),
            database_url: Some("sqlite::memory:".to_string()),
            database_table: "gatehouse_routes".to_string(),
        };
        let store = registry.build(&config).await.unwrap();
        assert!(store.get("/anything").await.unwrap().is_none());
    }
}
