use std::sync::Arc;

use tracing::{error, info};

use pulse_crawl::core::config::Config;
use pulse_crawl::AppState;

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(arg) = args.next() {
        if arg == "--port" {
            if let Some(value) = args.next() {
                if let Ok(port) = value.parse::<u16>() {
                    return Some(port);
                }
            }
        } else if let Some(rest) = arg.strip_prefix("--port=") {
            if let Ok(port) = rest.parse::<u16>() {
                return Some(port);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for key in ["PULSE_CRAWL_PORT", "PORT"] {
        if let Ok(value) = std::env::var(key) {
            if let Ok(port) = value.trim().parse::<u16>() {
                return Some(port);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = parse_port_from_args().or_else(port_from_env);

    // Stdio mode owns stdout for the protocol; logs always go to stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Misconfiguration is a startup failure with a non-zero exit.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    info!(
        "pulse-crawl v{} starting (storage: {:?}, vendor: {}, extractor: {})",
        env!("CARGO_PKG_VERSION"),
        state.config.storage,
        state.vendor.is_some(),
        state.extractor.is_some(),
    );

    match port {
        Some(port) => {
            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
            info!("HTTP transport listening on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, pulse_crawl::mcp::router(state))
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("shutdown signal received");
                })
                .await?;
        }
        None => {
            pulse_crawl::mcp::stdio::serve(state).await?;
        }
    }

    Ok(())
}
