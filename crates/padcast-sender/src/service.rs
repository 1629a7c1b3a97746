//! The sender service: a rate-paced send loop on a dedicated thread.
//!
//! Each tick samples the frame source, builds a [`PadState`] with the next
//! wrapping sequence number and a fresh origin timestamp, encodes it, and
//! fires it at the host.  UDP send failures are logged and the loop keeps
//! going: the next full-state snapshot supersedes anything lost.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use padcast_core::{PadState, SequenceCounter};

use crate::source::FrameSource;

/// Error type for sender operations.
#[derive(Debug, Error)]
pub enum SenderError {
    /// The local UDP socket could not be created.
    #[error("failed to open sender socket: {0}")]
    Socket(#[source] std::io::Error),
}

/// Configuration for the sender service.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Host address the datagrams are sent to.
    pub target: SocketAddr,
    /// Opaque client identifier presented to the host.
    pub client_id: u32,
    /// Frames sent per second.
    pub update_rate_hz: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1:7777".parse().unwrap(),
            client_id: generate_client_id(),
            update_rate_hz: 60,
        }
    }
}

/// Generates a client identifier from local entropy.
///
/// Client identifiers are opaque and unauthenticated; they only need to be
/// distinct between concurrently running senders, so hashing the clock and
/// thread identity is enough.
pub fn generate_client_id() -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::time::SystemTime;

    let mut hasher = DefaultHasher::new();
    SystemTime::now().hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);
    hasher.finish() as u32
}

/// The sender service.  `start` spawns the send thread; `stop` signals it
/// and joins.  Both are idempotent.
pub struct SenderService {
    config: SenderConfig,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Starts streaming frames from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::Socket`] if the local socket cannot be opened.
    pub fn start(&self, source: Box<dyn FrameSource>) -> Result<(), SenderError> {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            return Ok(());
        }

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(SenderError::Socket)?;
        self.running.store(true, Ordering::Relaxed);

        let running = Arc::clone(&self.running);
        let config = self.config.clone();
        let thread = std::thread::Builder::new()
            .name("padcast-sender".to_string())
            .spawn(move || send_loop(socket, config, source, running))
            .expect("failed to spawn sender thread");

        *handle = Some(thread);
        Ok(())
    }

    /// Signals the send loop to exit and joins it.
    pub fn stop(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = handle.take() {
            let _ = thread.join();
        }
    }

    pub fn client_id(&self) -> u32 {
        self.config.client_id
    }
}

impl Drop for SenderService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds the wire state for one tick.
fn build_state(config: &SenderConfig, sequence: u16, frame: crate::source::Frame) -> PadState {
    PadState::from_inputs(
        config.client_id,
        sequence,
        frame.buttons,
        frame.left_trigger,
        frame.right_trigger,
        frame.left_x,
        frame.left_y,
        frame.right_x,
        frame.right_y,
    )
}

fn send_loop(
    socket: UdpSocket,
    config: SenderConfig,
    mut source: Box<dyn FrameSource>,
    running: Arc<AtomicBool>,
) {
    info!(
        target = %config.target,
        client_id = config.client_id,
        rate_hz = config.update_rate_hz,
        "sender started"
    );

    let interval = Duration::from_secs_f64(1.0 / config.update_rate_hz.max(1) as f64);
    let sequence = SequenceCounter::new();
    let mut sent_in_window: u32 = 0;
    let mut window_start = Instant::now();

    while running.load(Ordering::Relaxed) {
        let frame = source.next_frame();
        let state = build_state(&config, sequence.next(), frame);
        let bytes = padcast_core::encode(&state);

        if let Err(e) = socket.send_to(&bytes, config.target) {
            warn!("send failed: {e}");
        } else {
            sent_in_window += 1;
        }

        // Per-second telemetry, mirrored from what the host measures.
        let elapsed = window_start.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            debug!(
                rate_hz = format_args!("{:.1}", sent_in_window as f64 / elapsed),
                seq = sequence.current(),
                "send rate"
            );
            sent_in_window = 0;
            window_start = Instant::now();
        }

        std::thread::sleep(interval);
    }

    info!("sender stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
