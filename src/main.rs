//! Print the topology of a running cluster.

use std::io::Write;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;

use gpmgmt_core::{read_gparray, Config, EnvUser};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::new()?;

    // Setup tracing/logging system.
    tracing_subscriber::registry()
        // Filter spans based on the configured RUST_LOG directives.
        .with(cfg.log_filter()?)
        // Send a copy of all spans to stdout in compact form.
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true),
        )
        // Install this registry as the global tracing registry.
        .try_init()
        .context("error initializing logging/tracing system")?;

    let connector = cfg.connector(&EnvUser)?;
    tracing::info!(
        host = %connector.host,
        port = %connector.port,
        dbname = %connector.dbname,
        utility = %connector.utility,
        "reading cluster topology",
    );
    let client = connector.connect().await.context("error connecting to the coordinator")?;
    let gparray = read_gparray(&client).await.context("error reading cluster topology")?;

    if let Some(coordinator) = gparray.coordinator() {
        tracing::info!(%coordinator, "coordinator");
    }
    match gparray.standby() {
        Some(standby) => tracing::info!(%standby, "standby"),
        None => tracing::info!("no standby configured"),
    }
    let mut pairs: Vec<_> = gparray.segment_pairs().iter().collect();
    pairs.sort_by_key(|pair| pair.content());
    for pair in pairs {
        match &pair.mirror {
            Some(mirror) => tracing::info!(content = pair.content(), primary = %pair.primary, %mirror, "segment pair"),
            None => tracing::info!(content = pair.content(), primary = %pair.primary, "segment pair"),
        }
    }
    tracing::info!(
        contents = gparray.segment_pairs().len(),
        has_mirrors = gparray.has_mirrors(),
        hosts = ?gparray.hostnames(),
        "cluster topology",
    );

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    Ok(())
}
