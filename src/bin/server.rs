//! HTTP server binary for the clearance proxy
//!
//! Starts an HTTP server that forwards requests through cached Cloudflare
//! clearances, solving Turnstile challenges in a pooled headless browser when
//! a target rejects the request.
//!
//! # Usage
//!
//! ```bash
//! cf-clearance-proxy --port 8191 --host 0.0.0.0
//! ```
//!
//! # API Endpoints
//!
//! - `POST /proxy`: Forward a request through a clearance
//! - `GET /health`: Health and pool occupancy report
//! - `GET /clearances`: List cached clearances
//! - `DELETE /clearances/{domain}`: Drop one cached clearance

use clap::Parser;
use std::sync::Arc;

use cf_clearance_proxy::browser::ChromiumSessionFactory;
use cf_clearance_proxy::proxy::ReqwestTransport;
use cf_clearance_proxy::server::{build_state, create_app};

/// HTTP proxy server with Cloudflare challenge solving
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides configuration)
    #[arg(long)]
    host: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    // Load configuration, then apply CLI overrides
    let mut settings = match cf_clearance_proxy::Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings: {}. Using defaults.", e);
            cf_clearance_proxy::Settings::default()
        }
    };
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    settings.validate()?;

    tracing::info!(
        "Starting clearance proxy v{}",
        cf_clearance_proxy::utils::version::get_version()
    );

    let factory = Arc::new(ChromiumSessionFactory::new(settings.browser.clone()));
    let transport = Arc::new(ReqwestTransport::new()?);
    let state = build_state(settings.clone(), factory, transport);
    let pool = Arc::clone(&state.pool);
    let app = create_app(state);

    // Parse address with IPv6/IPv4 fallback
    let addr = parse_and_bind_address(&settings.server.host, settings.server.port).await?;

    tracing::info!(
        "Clearance proxy v{} listening on {}",
        cf_clearance_proxy::utils::version::get_version(),
        addr
    );

    // Start the server; stop browsers on shutdown so Chromium does not linger
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown().await;
    tracing::info!("Clearance proxy stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Parse host string and attempt to bind to the address
///
/// - First try to bind to IPv6 (::)
/// - If that fails, fall back to IPv4 (0.0.0.0)
pub async fn parse_and_bind_address(host: &str, port: u16) -> anyhow::Result<std::net::SocketAddr> {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

    // Try to parse as IP address first
    if let Ok(ip) = host.parse::<IpAddr>() {
        let addr = SocketAddr::new(ip, port);
        tracing::debug!("Parsed address: {}", addr);
        return Ok(addr);
    }

    // Handle special cases like "::" for IPv6 any
    match host {
        "::" => {
            let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
            tracing::debug!("Using IPv6 any address: {}", addr);

            // Test if we can bind to IPv6
            match tokio::net::TcpListener::bind(addr).await {
                Ok(_) => {
                    tracing::info!("Successfully bound to IPv6 address {}", addr);
                    Ok(addr)
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not listen on [::]:{} (Caused by {}), falling back to 0.0.0.0",
                        port,
                        e
                    );
                    let fallback_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
                    tracing::info!("Using IPv4 fallback address: {}", fallback_addr);
                    Ok(fallback_addr)
                }
            }
        }
        "0.0.0.0" => {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
            tracing::info!("Using IPv4 any address: {}", addr);
            Ok(addr)
        }
        _ => {
            anyhow::bail!(
                "Invalid host address: {}. Use '::' for IPv6 or '0.0.0.0' for IPv4",
                host
            );
        }
    }
}
