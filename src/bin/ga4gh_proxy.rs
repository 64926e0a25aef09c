//!
//! authorizing proxy binary
//! ------------------------
//! Reverse proxy to TARGET that replaces accepted bearer tokens with access
//! tokens for the caller's backing service account. Configured through
//! TARGET, CONFIG, PROJECT, ROLE, SCOPES and PORT.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use ga4gh_identity::config;
use ga4gh_identity::proxy::Proxy;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let settings = config::ProxySettings::from_env()?;
    let client = reqwest::Client::new();
    let evaluator = config::evaluator(&client, &settings.evaluator).await?;
    let warehouse = config::warehouse(&client, &settings.warehouse);
    let proxy = Proxy::new(settings.target.clone(), evaluator, warehouse).context("creating proxy")?;

    let addr: SocketAddr = format!("0.0.0.0:{}", settings.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!(target: "startup", "proxying {} on {}", settings.target, addr);
    axum::serve(listener, Arc::new(proxy).router()).await.context("serving proxy")?;
    Ok(())
}
