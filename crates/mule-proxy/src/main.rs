//! Relay binary.
//!
//! ```text
//! mule-proxy <config.json> [--port 5353] [--upstream URL] [--rate-limit 9] ...
//! ```
//!
//! `config.json` is a JSON array of `{"user": "...", "password": "..."}`
//! objects. Running without it prints usage and exits successfully.
//!
//! # Environment variables
//!
//! | Variable                           | Default | Description                        |
//! |------------------------------------|---------|------------------------------------|
//! | `MULE_PROXY_PORT`                  | `5353`  | TCP port to listen on              |
//! | `MULE_PROXY_UPSTREAM`              | upstream API | Upstream origin               |
//! | `MULE_PROXY_RATE_LIMIT`            | `9`     | Upstream requests per window       |
//! | `MULE_PROXY_QUOTA_WINDOW_SECS`     | `60`    | Quota window length                |
//! | `MULE_PROXY_UPSTREAM_TIMEOUT_SECS` | `30`    | Upstream request timeout           |
//! | `MULE_PROXY_STATIC_DIR`            | cwd if it has `muledump.html` | Static files |
//! | `RUST_LOG`                         | `info`  | Log filter (tracing-subscriber)    |

use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use mule_proxy::config::{self, Config};
use mule_proxy::credentials::{CredentialDirectory, load_credentials};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "mule-proxy", author, version, about, long_about = None)]
struct Args {
    /// Credential file: JSON array of {"user", "password"} objects
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "MULE_PROXY_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Upstream API origin
    #[arg(long, env = "MULE_PROXY_UPSTREAM", default_value = config::DEFAULT_UPSTREAM_ORIGIN)]
    upstream: String,

    /// Upstream requests allowed per quota window
    #[arg(long, env = "MULE_PROXY_RATE_LIMIT", default_value_t = config::DEFAULT_RATE_LIMIT)]
    rate_limit: u32,

    /// Quota window length in seconds
    #[arg(long, env = "MULE_PROXY_QUOTA_WINDOW_SECS", default_value_t = config::DEFAULT_QUOTA_WINDOW.as_secs(),
          value_parser = clap::value_parser!(u64).range(1..))]
    quota_window_secs: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "MULE_PROXY_UPSTREAM_TIMEOUT_SECS", default_value_t = config::DEFAULT_UPSTREAM_TIMEOUT.as_secs())]
    upstream_timeout_secs: u64,

    /// Serve static files from this directory (default: the working directory
    /// when it contains muledump.html)
    #[arg(long, env = "MULE_PROXY_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let Some(config_path) = args.config.as_deref() else {
        let _ = Args::command().print_help();
        println!();
        std::process::exit(0);
    };

    let credentials = load_credentials(config_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load credentials");
        std::process::exit(1);
    });
    let directory = CredentialDirectory::new(credentials);

    let static_dir = match args.static_dir {
        Some(dir) => Some(dir),
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to determine working directory");
                std::process::exit(1);
            });
            config::detect_static_dir(&cwd)
        }
    };

    let config = Config::new()
        .with_port(args.port)
        .with_upstream_origin(args.upstream)
        .with_rate_limit(args.rate_limit)
        .with_quota_window(Duration::from_secs(args.quota_window_secs))
        .with_upstream_timeout(Duration::from_secs(args.upstream_timeout_secs))
        .with_static_dir(static_dir);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    if let Err(e) = mule_proxy::serve(config, directory, shutdown).await {
        tracing::error!(error = %e, "Relay exited with error");
        std::process::exit(1);
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = sigterm => {}
    }
}
