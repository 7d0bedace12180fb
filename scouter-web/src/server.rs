//! Scouter Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use scouter_core::ScouterConfig;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Interval between sweeps of ended rate-limit windows
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Main Scouter web server
pub struct ScouterServer {
    state: AppState,
}

impl ScouterServer {
    /// Create a new server from configuration
    pub async fn new(config: ScouterConfig) -> WebResult<Self> {
        let state = AppState::new(config).await?;
        Ok(Self { state })
    }

    /// Wrap prepared state
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> WebResult<()> {
        let address = self.state.config.server.address();

        info!("Starting Scouter Web Server");
        info!("Server address: http://{}", address);
        info!("Auth mode: {}", self.state.config.auth.mode);
        info!("Development mode: {}", self.state.config.server.dev_mode);

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C
    pub async fn serve(self, listener: TcpListener) -> WebResult<()> {
        let app = create_app(self.state.clone());

        if let Ok(local) = listener.local_addr() {
            info!("Server listening on http://{}", local);
        }

        let purge_state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                match purge_state.purge_expired_windows().await {
                    Ok(removed) => debug!(removed, "Rate-limit window purge finished"),
                    Err(e) => warn!("Rate-limit window purge failed: {}", e),
                }
            }
        });

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down gracefully");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &ScouterConfig {
        &self.state.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for ScouterServer
pub struct ScouterServerBuilder {
    config: ScouterConfig,
}

impl ScouterServerBuilder {
    /// Start from the built-in defaults
    pub fn new() -> Self {
        Self {
            config: ScouterConfig::default(),
        }
    }

    /// Start from loaded configuration
    pub fn with_config(config: ScouterConfig) -> Self {
        Self { config }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Enable development mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.server.dev_mode = dev_mode;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database.url = Some(database_url.into());
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<ScouterServer> {
        ScouterServer::new(self.config).await
    }
}

impl Default for ScouterServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
