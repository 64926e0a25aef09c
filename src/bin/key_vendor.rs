//!
//! key vendor binary
//! -----------------
//! Issues Google service account key files to callers whose bearer token the
//! configured evaluator accepts. Configured through EVALUATOR, PROJECT, ROLE,
//! SCOPES and PORT.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use ga4gh_identity::{config, handler};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let settings = config::KeyVendorSettings::from_env()?;
    let client = reqwest::Client::new();
    let evaluator = config::evaluator(&client, &settings.evaluator).await?;
    let warehouse = config::warehouse(&client, &settings.warehouse);

    let app = handler::key_vendor_router(evaluator, warehouse);
    let addr: SocketAddr = format!("0.0.0.0:{}", settings.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!(target: "startup", "key vendor listening on {}", addr);
    axum::serve(listener, app).await.context("serving key vendor")?;
    Ok(())
}
