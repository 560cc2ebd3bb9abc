// Gatehouse — a dynamic, API-configurable reverse proxy.
//
// Architecture: tokio task-per-connection data plane, axum management API,
// both driven from a single runtime.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gatehouse_admin::{build_admin_router, AdminState};
use gatehouse_core::config::GatehouseConfig;
use gatehouse_proxy::ProxyEngine;
use gatehouse_router::{ActivityRecorder, Router};
use gatehouse_store::StoreRegistry;
use tracing::{info, warn};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// CLI flags, dispatched onto `GatehouseConfig` after the file/env layers
/// are merged — grounded on the teacher's `ando-server::Cli`
/// (`clap::Parser` struct, `--config`/`--log-level` fields) extended with
/// every flag spec.md §6 names.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about = "Gatehouse — a dynamic, API-configurable reverse proxy")]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Proxy port listen address.
    #[arg(long)]
    ip: Option<IpAddr>,
    /// Proxy port.
    #[arg(long)]
    port: Option<u16>,

    /// Management API listen address.
    #[arg(long)]
    api_ip: Option<IpAddr>,
    /// Management API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Upstream used when no route matches.
    #[arg(long)]
    default_target: Option<String>,

    /// Error-handler sub-request target, spec.md §4.5.
    #[arg(long)]
    error_target: Option<String>,
    /// Error-handler static file directory, spec.md §4.5.
    #[arg(long)]
    error_path: Option<PathBuf>,

    /// Accepted for compatibility; unimplemented (spec.md §6).
    #[arg(long)]
    redirect_port: Option<u16>,

    /// Disable prepending the upstream's base path to the forwarded path.
    #[arg(long)]
    no_prepend_path: bool,
    /// Disable including the matched prefix in the forwarded suffix.
    #[arg(long)]
    no_include_prefix: bool,

    /// Accept-to-first-byte timeout in seconds. 0 disables it.
    #[arg(long)]
    timeout: Option<u64>,
    /// Idle timeout once streaming has begun, in seconds. 0 disables it.
    #[arg(long)]
    proxy_timeout: Option<u64>,

    /// Disable `X-Forwarded-*` header injection.
    #[arg(long)]
    no_x_forward: bool,

    /// Repeatable `NAME:VALUE` custom header, applied last.
    #[arg(long = "custom-header", value_parser = parse_custom_header)]
    custom_headers: Vec<(String, String)>,

    /// Storage backend name looked up in the store registry.
    #[arg(long)]
    storage_backend: Option<String>,

    /// Log level passed to the tracing filter.
    #[arg(long)]
    log_level: Option<String>,

    /// PID file path, written once the server is listening.
    #[arg(long)]
    pid_file: Option<PathBuf>,
}

fn parse_custom_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected NAME:VALUE, got {raw:?}"))
}

/// Apply CLI overrides onto a file/env-loaded config. CLI wins over both.
fn apply_cli_overrides(mut config: GatehouseConfig, cli: &Cli) -> GatehouseConfig {
    if let Some(ip) = cli.ip {
        config.proxy.ip = ip;
    }
    if let Some(port) = cli.port {
        config.proxy.port = port;
    }
    if let Some(ip) = cli.api_ip {
        config.admin.ip = ip;
    }
    if let Some(port) = cli.api_port {
        config.admin.port = port;
    }
    if cli.default_target.is_some() {
        config.proxy.default_target = cli.default_target.clone();
    }
    if cli.error_target.is_some() {
        config.error_handling.error_target = cli.error_target.clone();
    }
    if cli.error_path.is_some() {
        config.error_handling.error_path = cli.error_path.clone();
    }
    if cli.no_prepend_path {
        config.proxy.prepend_path = false;
    }
    if cli.no_include_prefix {
        config.proxy.include_prefix = false;
    }
    if let Some(secs) = cli.timeout {
        config.proxy.timeout_secs = secs;
    }
    if let Some(secs) = cli.proxy_timeout {
        config.proxy.proxy_timeout_secs = secs;
    }
    if cli.no_x_forward {
        config.proxy.x_forward = false;
    }
    for (name, value) in &cli.custom_headers {
        config.proxy.custom_headers.insert(name.clone(), value.clone());
    }
    if let Some(backend) = &cli.storage_backend {
        config.storage.backend = backend.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.pid_file.is_some() {
        config.pid_file = cli.pid_file.clone();
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = GatehouseConfig::load(cli.config.as_deref())?;
    let config = apply_cli_overrides(config, &cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gatehouse starting");

    if cli.redirect_port.is_some() {
        warn!("--redirect-port accepted for compatibility, has no effect");
    }

    let auth_token = config.admin.auth_token.clone().unwrap_or_else(|| {
        let generated = uuid::Uuid::new_v4().to_string();
        info!(token = %generated, "no admin auth token configured, generated one for this run");
        generated
    });

    let registry = StoreRegistry::with_builtins();
    let store = registry.build(&config.storage).await?;

    let activity = ActivityRecorder::new(store.clone(), Duration::from_secs(5));
    let router = Arc::new(Router::new(store, activity));

    let proxy_engine = Arc::new(ProxyEngine::new(router.clone(), &config));

    let admin_state = Arc::new(AdminState {
        store: router.store().clone(),
        auth_token: Some(auth_token),
    });
    let admin_router = build_admin_router(admin_state);
    let admin_addr = std::net::SocketAddr::new(config.admin.ip, config.admin.port);

    if let Some(pid_path) = &config.pid_file {
        std::fs::write(pid_path, std::process::id().to_string())?;
        info!(path = %pid_path.display(), "pid file written");
    }

    setup_signal_handler();

    let proxy_handle = tokio::spawn(async move {
        if let Err(e) = proxy_engine.run().await {
            tracing::error!(error = %e, "proxy engine exited");
        }
    });

    let admin_handle = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(admin_addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, %admin_addr, "failed to bind admin API");
                return;
            }
        };
        info!(%admin_addr, "management api listening");
        if let Err(e) = axum::serve(listener, admin_router).await {
            tracing::error!(error = %e, "admin api exited");
        }
    });

    info!(
        proxy_addr = %std::net::SocketAddr::new(config.proxy.ip, config.proxy.port),
        admin_addr = %admin_addr,
        "gatehouse is ready"
    );

    while !SHUTDOWN.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("shutdown signal received, stopping");
    proxy_handle.abort();
    admin_handle.abort();

    Ok(())
}

fn setup_signal_handler() {
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
