use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use docchat_core::SessionRegistry;
use docchat_core::config::Config;
use docchat_core::vault::VaultProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

#[derive(Clone)]
pub(crate) struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<Config>,
    pub vault: Arc<dyn VaultProvider>,
    pub started_at: Instant,
}

pub struct GatewayServer {
    addr: SocketAddr,
    rate_limit: u32,
    max_body_size: usize,
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
    vault: Arc<dyn VaultProvider>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    /// Server for the chat UI and session API, configured from `config.gateway`.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<SessionRegistry>,
        vault: Arc<dyn VaultProvider>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let bind = config.gateway.bind.as_str();
        let port = config.gateway.port;
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, sessions carry API keys in memory");
        }

        Self {
            addr,
            rate_limit: config.gateway.rate_limit,
            max_body_size: config.gateway.max_body_size,
            registry,
            config,
            vault,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP server and run until the shutdown channel flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            registry: self.registry,
            config: self.config,
            vault: self.vault,
            started_at: Instant::now(),
        };

        let router = build_router(state, self.rate_limit, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("chat UI listening on http://{}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("gateway shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
