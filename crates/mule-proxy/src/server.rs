use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::credentials::CredentialDirectory;
use crate::quota::QuotaGate;
use crate::relay::{RelayState, router};
use crate::upstream::UpstreamClient;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("error starting server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Binds `0.0.0.0:<port>` and runs the relay until `shutdown` is cancelled.
///
/// A bind failure cancels `shutdown` so sibling tasks stop too.
pub async fn serve(
    config: Config,
    directory: CredentialDirectory,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            shutdown.cancel();
            return Err(ServeError::Bind { addr, source });
        }
    };

    serve_listener(listener, config, directory, shutdown).await
}

/// Runs the relay on an already bound listener until `shutdown` is cancelled.
///
/// Owns the quota reset task: it starts with the server and is joined after
/// the server drains.
pub async fn serve_listener(
    listener: TcpListener,
    config: Config,
    directory: CredentialDirectory,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let upstream = match UpstreamClient::new(config.upstream_origin(), config.upstream_timeout()) {
        Ok(upstream) => upstream,
        Err(e) => {
            shutdown.cancel();
            return Err(ServeError::HttpClient(e));
        }
    };
    let quota = Arc::new(QuotaGate::new(config.rate_limit()));
    let accounts = directory.len();
    let state = RelayState::new(directory, Arc::clone(&quota), upstream);
    let app = router(state, config.static_dir());

    let reset_task = quota.spawn_reset(config.quota_window(), shutdown.clone());

    info!(
        addr = ?listener.local_addr().ok(),
        accounts,
        upstream = config.upstream_origin(),
        rate_limit = config.rate_limit(),
        quota_window_secs = config.quota_window().as_secs(),
        static_dir = ?config.static_dir(),
        "Relay listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .map_err(ServeError::Serve);

    shutdown.cancel();
    if let Err(e) = reset_task.await {
        warn!(error = %e, "Quota reset task ended abnormally");
    }
    info!("Relay stopped");

    result
}
