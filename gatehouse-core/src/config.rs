use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration for Gatehouse, built once at startup and shared
/// by `Arc` reference into the Router, Proxy Engine, and Management API —
/// there is no global configuration singleton (spec.md §9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatehouseConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub log_level: String,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_ip")]
    pub ip: IpAddr,
    #[serde(default = "default_proxy_port")]
    pub port: u16,

    /// Used when no route matches and no other route has prefix `/`.
    #[serde(default)]
    pub default_target: Option<String>,

    /// If true (default), the matched prefix is prepended to the upstream
    /// path; otherwise only the suffix is forwarded.
    #[serde(default = "default_true")]
    pub prepend_path: bool,

    /// If true (default), the suffix forwarded to `prepend_path` includes
    /// the matched prefix; otherwise the prefix is stripped first.
    #[serde(default = "default_true")]
    pub include_prefix: bool,

    /// Rewrite `Host` to the upstream authority. Spec.md leaves the exact
    /// semantics unsupported; this field exists as a hook but the
    /// behavior is always "false" regardless of its value (spec.md §9).
    #[serde(default)]
    pub change_origin: bool,

    /// Inject `X-Forwarded-*` headers. Default on.
    #[serde(default = "default_true")]
    pub x_forward: bool,

    /// Applied last, after all other header rules, overriding on collision.
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,

    /// Seconds from accept to first upstream response byte. 0 = no timeout.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Idle seconds once streaming has begun. 0 = no timeout.
    #[serde(default)]
    pub proxy_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_ip")]
    pub ip: IpAddr,
    #[serde(default = "default_admin_port")]
    pub port: u16,

    /// Bearer token required on every management API request. If unset at
    /// load time, the caller (gatehouse-server) generates one and logs it.
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Short backend identifier looked up in the factory registry:
    /// `memory`, `database`, or an externally registered name.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// `CHP_DATABASE_URL` — only consulted when `backend == "database"`.
    #[serde(default)]
    pub database_url: Option<String>,

    /// `CHP_DATABASE_TABLE` — only consulted when `backend == "database"`.
    #[serde(default = "default_database_table")]
    pub database_table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Sub-request target for the highest-precedence error handler path.
    #[serde(default)]
    pub error_target: Option<String>,
    /// Local directory searched for `<status>.html` / `error.html`.
    #[serde(default)]
    pub error_path: Option<PathBuf>,
}

impl GatehouseConfig {
    /// Load from an optional YAML file plus environment variable overrides,
    /// the same two-source merge the teacher's `AndoConfig::load` performs.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["gatehouse.yaml", "/etc/gatehouse/gatehouse.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(*default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("GATEHOUSE_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            admin: AdminConfig::default(),
            storage: StorageConfig::default(),
            error_handling: ErrorHandlingConfig::default(),
            log_level: "info".to_string(),
            pid_file: None,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            ip: default_proxy_ip(),
            port: default_proxy_port(),
            default_target: None,
            prepend_path: true,
            include_prefix: true,
            change_origin: false,
            x_forward: true,
            custom_headers: HashMap::new(),
            timeout_secs: 0,
            proxy_timeout_secs: 0,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            ip: default_admin_ip(),
            port: default_admin_port(),
            auth_token: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: None,
            database_table: default_database_table(),
        }
    }
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            error_target: None,
            error_path: None,
        }
    }
}

fn default_proxy_ip() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_proxy_port() -> u16 {
    8000
}

fn default_admin_ip() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_admin_port() -> u16 {
    8001
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_database_table() -> String {
    "gatehouse_routes".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_mandated_ports() {
        let cfg = GatehouseConfig::default();
        assert_eq!(cfg.proxy.port, 8000);
        assert_eq!(cfg.admin.port, 8001);
        assert!(cfg.proxy.prepend_path);
        assert!(cfg.proxy.include_prefix);
        assert!(cfg.proxy.x_forward);
        assert!(!cfg.proxy.change_origin);
        assert_eq!(cfg.storage.backend, "memory");
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let cfg = GatehouseConfig::load(None).unwrap();
        assert_eq!(cfg.proxy.port, 8000);
    }

    #[test]
    fn load_merges_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatehouse.yaml");
        std::fs::write(
            &path,
            "proxy:\n  port: 9000\nstorage:\n  backend: database\n",
        )
        .unwrap();

        let cfg = GatehouseConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.proxy.port, 9000);
        assert_eq!(cfg.storage.backend, "database");
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.admin.port, 8001);
    }
}
