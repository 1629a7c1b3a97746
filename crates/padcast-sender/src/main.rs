//! PadCast sender application entry point.
//!
//! Streams neutral heartbeat frames at the configured host until Ctrl-C.
//! A real input-capture collaborator replaces [`NeutralFrames`] through the
//! same `FrameSource` seam.

use tracing::info;
use tracing_subscriber::EnvFilter;

use padcast_sender::service::{SenderConfig, SenderService};
use padcast_sender::source::NeutralFrames;

/// Environment variable overriding the default loopback target.
const TARGET_ENV: &str = "PADCAST_TARGET";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = SenderConfig::default();
    if let Ok(target) = std::env::var(TARGET_ENV) {
        config.target = target
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {TARGET_ENV} value {target:?}: {e}"))?;
    }

    info!(
        target = %config.target,
        client_id = config.client_id,
        "PadCast sender starting"
    );

    let service = SenderService::new(config);
    service.start(Box::new(NeutralFrames))?;

    info!("PadCast sender ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await?;

    service.stop();
    info!("PadCast sender stopped");
    Ok(())
}
