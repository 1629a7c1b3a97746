//! PadCast host application entry point.
//!
//! Wires together configuration, the pad backend, and the host service, then
//! pumps telemetry events into the log until Ctrl-C.
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config or defaults
//!  └─ HostService::start()   -- binds UDP, spawns the receive thread
//!  └─ event pump             -- Tokio task draining HostEvents into tracing
//! ```

use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use padcast_host::application::session::HostEvent;
use padcast_host::infrastructure::net::HostService;
use padcast_host::infrastructure::pad_backend::logging::LoggingPadBackend;
use padcast_host::infrastructure::storage::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Structured logging.  Level comes from the config file and is
    // overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.host.log_level.clone())),
        )
        .init();

    info!("PadCast host starting");

    let host_config = config.host_config()?;
    let security_config = config.security_config()?;

    // The logging backend is the in-tree fallback; an OS driver integration
    // (ViGEm, uinput) plugs in through the same PadBackend trait.
    let backend = Arc::new(LoggingPadBackend::new());
    let (service, mut events) = HostService::new(host_config, security_config, backend);

    let addr = service.start()?;
    info!("listening on UDP {addr}");

    // ── Telemetry pump ────────────────────────────────────────────────────────
    let pump = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                HostEvent::SessionJoined {
                    client_id,
                    label,
                    slot,
                    ..
                } => info!(client_id, slot, "{label} joined"),
                HostEvent::SessionLeft {
                    client_id,
                    label,
                    slot,
                } => info!(client_id, slot, "{label} left"),
                HostEvent::SessionStats {
                    client_id,
                    slot,
                    latency_ms,
                    jitter_ms,
                    rate_hz,
                    sequence,
                } => debug!(
                    client_id,
                    slot,
                    latency_ms = format_args!("{latency_ms:.1}"),
                    jitter_ms = format_args!("{jitter_ms:.1}"),
                    rate_hz = format_args!("{rate_hz:.1}"),
                    sequence,
                    "session stats"
                ),
                HostEvent::Status(line) => info!("{line}"),
            }
        }
    });

    info!("PadCast host ready.  Press Ctrl-C to exit.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to wait for shutdown signal: {e}");
    }

    info!("shutdown signal received");
    service.stop();
    pump.abort();

    info!("PadCast host stopped");
    Ok(())
}
