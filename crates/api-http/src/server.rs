//! HTTP Server
//!
//! Binds a TCP listener and serves the router until the shutdown future resolves.

use crate::router::create_router;
use crate::state::ApiState;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 8000;

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

/// HTTP Server
pub struct HttpServer {
    config: HttpServerConfig,
    state: ApiState,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: ApiState) -> Self {
        Self { config, state }
    }

    /// Bind the configured address. Port 0 picks a free port.
    pub async fn bind(self) -> io::Result<BoundServer> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!(address = %local_addr, "HTTP server listening");

        Ok(BoundServer {
            listener,
            local_addr,
            state: self.state,
        })
    }
}

/// Listener that has been bound but is not yet accepting connections
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: ApiState,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn serve<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}
