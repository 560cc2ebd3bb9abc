use std::sync::Arc;

use gatehouse_core::config::{GatehouseConfig, ProxyConfig};
use gatehouse_router::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::connection::handle_connection;
use crate::error_handler::ErrorHandler;

/// C3: the proxy data plane's top-level accept loop. One task per
/// connection, grounded on the teacher's worker model
/// (`ando-proxy/src/worker.rs`) minus the per-core `monoio` event loop —
/// see DESIGN.md for why this repo unifies on `tokio::spawn` instead.
pub struct ProxyEngine {
    router: Arc<Router>,
    error_handler: Arc<ErrorHandler>,
    config: Arc<ProxyConfig>,
}

impl ProxyEngine {
    pub fn new(router: Arc<Router>, config: &GatehouseConfig) -> Self {
        Self {
            router,
            error_handler: Arc::new(ErrorHandler::new(&config.error_handling)),
            config: Arc::new(config.proxy.clone()),
        }
    }

    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let addr = std::net::SocketAddr::new(self.config.ip, self.config.port);
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "proxy engine listening");

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            let router = self.router.clone();
            let error_handler = self.error_handler.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                handle_connection(stream, peer_addr, router, error_handler, config).await;
            });
        }
    }
}
