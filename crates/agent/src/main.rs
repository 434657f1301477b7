//! Telemetry agent - host and container metrics derivation
//!
//! Wires the derivation core to a Linux counter source and a channel
//! sink, ticks once per second, and logs emitted samples. Container
//! snapshots are accepted over the feed channel; wiring an actual
//! runtime stats subscription is left to the deployment.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use telemetry_core::{
    ChannelSink, HostCalculator, LinuxCounterSource, TickDriverBuilder,
};
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting telemetry-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        tick_interval_ms = config.tick_interval_ms,
        cgroup_root = %config.cgroup_root,
        "Agent configured"
    );

    let source = Arc::new(LinuxCounterSource::new(
        &config.proc_root,
        &config.cgroup_root,
        &config.sysfs_net_root,
    ));
    let host = HostCalculator::detect(source).await;

    let (sink, mut samples) = ChannelSink::new(config.sample_buffer);
    let driver = TickDriverBuilder::new()
        .host(host)
        .sink(Arc::new(sink))
        .interval(Duration::from_millis(config.tick_interval_ms))
        .build()?;

    // The snapshot feed stays open for the process lifetime; a runtime
    // stats subscription would send events on feed_tx
    let (_feed_tx, feed_rx) = mpsc::channel(config.sample_buffer);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let driver_handle = tokio::spawn(driver.run(feed_rx, shutdown_rx));

    // Drain the sink; transport to a metrics backend goes here
    let drain_handle = tokio::spawn(async move {
        while let Some(sample) = samples.recv().await {
            info!(
                entity = %sample.entity,
                signal = %sample.signal,
                value = sample.value,
                timestamp = sample.timestamp,
                "sample"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");
    let _ = shutdown_tx.send(());

    let _ = driver_handle.await;
    drain_handle.abort();

    Ok(())
}
