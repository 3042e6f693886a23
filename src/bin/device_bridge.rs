//! Reads raw 5-byte frames from a serial line (or stdin) and forwards each
//! decoded reading to the ingestion endpoint.
//!
//! Usage:
//!   BRIDGE_INPUT=/dev/ttyUSB0 BRIDGE_INGEST_URL=http://host:8080/telemetry \
//!   BRIDGE_OWNER_ID=... BRIDGE_DEVICE_SERIAL=... BRIDGE_SENSOR_KIND=... \
//!   cargo run --bin device_bridge

use anyhow::{Context, Result};
use tokio::io::AsyncRead;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telemetry_service::bridge::{self, BridgeConfig, IngestClient};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = BridgeConfig::from_env()?;
    let client = IngestClient::new(&config);

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &config.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open serial input {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    info!(
        url = %config.ingest_url,
        device_serial = %config.device_serial,
        policy = ?config.sync_policy,
        "Device bridge started"
    );
    bridge::pump(&config, reader, &client).await?;
    Ok(())
}
