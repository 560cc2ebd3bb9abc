use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::error::GatehouseError;
use gatehouse_core::normalize::prefix_matches;
use gatehouse_core::route::Route;
use gatehouse_core::store::{RoutePatch, Store};
use serde_json::Map;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, Pool, Row};

/// SQL-backed `Store`. A single table, one row per prefix, as spec.md §6
/// describes: `(prefix PK, target, last_activity, data-as-JSON)`.
///
/// Backed by `sqlx::Any` so the same queries run against `sqlite://`,
/// `postgres://`, or `mysql://` — whichever scheme `CHP_DATABASE_URL`
/// names — rather than compiling one concrete backend per database, which
/// the teacher had no analogue for (it persisted to etcd instead; see
/// DESIGN.md). `get_target` loads every row and picks the longest match in
/// application code, which spec.md §4.1 explicitly allows for small N; the
/// alternative ("query all prefixes that are prefixes of the request
/// path") needs backend-specific SQL this crate does not special-case.
pub struct SqlStore {
    pool: Pool<Any>,
    table: String,
}

impl SqlStore {
    pub async fn connect(database_url: &str, table: &str) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self {
            pool,
            table: table.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                prefix TEXT PRIMARY KEY, \
                target TEXT NOT NULL, \
                last_activity TEXT NOT NULL, \
                data TEXT NOT NULL\
            )",
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_route(row: &AnyRow) -> Result<Route, GatehouseError> {
        let prefix: String = row.try_get("prefix").map_err(sqlx_err)?;
        let target: String = row.try_get("target").map_err(sqlx_err)?;
        let last_activity_raw: String = row.try_get("last_activity").map_err(sqlx_err)?;
        let data_raw: String = row.try_get("data").map_err(sqlx_err)?;

        let last_activity = DateTime::parse_from_rfc3339(&last_activity_raw)
            .map_err(|e| GatehouseError::StoreError(e.to_string()))?
            .with_timezone(&Utc);
        let data: Map<String, serde_json::Value> =
            serde_json::from_str(&data_raw).unwrap_or_default();

        Ok(Route {
            prefix,
            target,
            last_activity,
            data,
        })
    }
}

fn sqlx_err(e: sqlx::Error) -> GatehouseError {
    GatehouseError::StoreError(e.to_string())
}

#[async_trait]
impl Store for SqlStore {
    async fn get_target(&self, path: &str) -> Result<Option<Route>, GatehouseError> {
        let all = self.get_all().await?;
        Ok(all
            .into_values()
            .filter(|r| prefix_matches(&r.prefix, path))
            .max_by_key(|r| r.prefix.len()))
    }

    async fn get(&self, prefix: &str) -> Result<Option<Route>, GatehouseError> {
        let sql = format!(
            "SELECT prefix, target, last_activity, data FROM {} WHERE prefix = ?",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(prefix)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_route).transpose()
    }

    async fn get_all(&self) -> Result<HashMap<String, Route>, GatehouseError> {
        let sql = format!(
            "SELECT prefix, target, last_activity, data FROM {}",
            self.table
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(sqlx_err)?;
        rows.iter()
            .map(|row| Self::row_to_route(row).map(|r| (r.prefix.clone(), r)))
            .collect()
    }

    async fn add(
        &self,
        prefix: &str,
        target: &str,
        data: Map<String, serde_json::Value>,
    ) -> Result<Route, GatehouseError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;

        let select_sql = format!(
            "SELECT prefix, target, last_activity, data FROM {} WHERE prefix = ?",
            self.table
        );
        let existing = sqlx::query(&select_sql)
            .bind(prefix)
            .fetch_optional(&mut *tx)
            .await
            .map_err(sqlx_err)?;

        let route = match existing {
            Some(row) => {
                let mut route = Self::row_to_route(&row)?;
                route.target = target.to_string();
                route.merge_data(data);
                route.last_activity = Utc::now();

                let update_sql = format!(
                    "UPDATE {} SET target = ?, last_activity = ?, data = ? WHERE prefix = ?",
                    self.table
                );
                sqlx::query(&update_sql)
                    .bind(&route.target)
                    .bind(route.last_activity.to_rfc3339())
                    .bind(serde_json::to_string(&route.data).map_err(GatehouseError::Serde)?)
                    .bind(prefix)
                    .execute(&mut *tx)
                    .await
                    .map_err(sqlx_err)?;
                route
            }
            None => {
                let route = Route::new(prefix.to_string(), target.to_string(), data);
                let insert_sql = format!(
                    "INSERT INTO {} (prefix, target, last_activity, data) VALUES (?, ?, ?, ?)",
                    self.table
                );
                sqlx::query(&insert_sql)
                    .bind(&route.prefix)
                    .bind(&route.target)
                    .bind(route.last_activity.to_rfc3339())
                    .bind(serde_json::to_string(&route.data).map_err(GatehouseError::Serde)?)
                    .execute(&mut *tx)
                    .await
                    .map_err(sqlx_err)?;
                route
            }
        };

        tx.commit().await.map_err(sqlx_err)?;
        Ok(route)
    }

    async fn update(&self, prefix: &str, partial: RoutePatch) -> Result<(), GatehouseError> {
        let Some(current) = self.get(prefix).await? else {
            return Err(GatehouseError::NotFound(prefix.to_string()));
        };

        let Some(ts) = partial.last_activity else {
            return Ok(());
        };
        if ts <= current.last_activity {
            return Ok(());
        }

        let sql = format!("UPDATE {} SET last_activity = ? WHERE prefix = ?", self.table);
        sqlx::query(&sql)
            .bind(ts.to_rfc3339())
            .bind(prefix)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn remove(&self, prefix: &str) -> Result<(), GatehouseError> {
        let sql = format!("DELETE FROM {} WHERE prefix = ?", self.table);
        sqlx::query(&sql)
            .bind(prefix)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }
}
