//! HTTP gateway in front of the upstream reservation service.
//!
//! Exposes login/logout/session endpoints backed by the session store and
//! the aggregated `/api/huts` listing backed by the aggregation engine.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics_defs;
pub mod service;

pub use config::Config;
pub use errors::GatewayError;
pub use service::GatewayService;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::net::TcpListener;

/// Binds the listener and serves the gateway until the process exits.
pub async fn run(config: Config) -> Result<(), GatewayError> {
    let host = config.listener.host.clone();
    let port = config.listener.port;
    let service = GatewayService::new(config);

    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(%host, port, "gateway listening");

    loop {
        let (stream, _peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            let _ = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await;
        });
    }
}
