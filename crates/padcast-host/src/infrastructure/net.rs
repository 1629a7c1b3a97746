//! The UDP host service: socket ownership, the receive loop, and the
//! operator surface.
//!
//! The receive loop is single-threaded by design.  One dedicated thread
//! blocks on the socket with a bounded read timeout, then decodes,
//! authorizes, and mutates session state strictly sequentially, which is
//! why the router needs no locks of its own.  On every timeout tick the
//! liveness sweep runs, so sessions are evicted even when no traffic
//! arrives.
//!
//! Operator calls arrive from other threads (UI, console) and cross into the
//! loop's world only through the two mutex-guarded structures shared with
//! it: the security manager and the session registry.
//!
//! `start` and `stop` are idempotent.  Cancellation is cooperative via one
//! stop flag observed at the top of every loop iteration and inside every
//! retry backoff, so `stop` joins within one read timeout.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::application::admission::{SecurityConfig, SecurityEvent, SecurityManager, SecurityStats};
use crate::application::pads::PadBackend;
use crate::application::registry::{SessionRegistry, SessionSnapshot};
use crate::application::router::{HostMode, PadRouter, RouterConfig};
use crate::application::session::HostEvent;

/// Error type for host service operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// The UDP socket could not be bound.  The only fatal startup error;
    /// everything after bind is drop-and-continue.
    #[error("failed to bind host socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for the host service.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// IP address to bind the socket to.  `0.0.0.0` binds all interfaces.
    pub bind_address: std::net::IpAddr,
    /// UDP port to listen on.  Port 0 asks the OS for an ephemeral port.
    pub port: u16,
    /// Socket read timeout; also the cadence of the liveness sweep and the
    /// bound on how long `stop` can take to join the loop.
    pub recv_timeout: Duration,
    pub router: RouterConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".parse().unwrap(),
            port: 7777,
            recv_timeout: Duration::from_millis(500),
            router: RouterConfig::for_mode(HostMode::MultiSlot),
        }
    }
}

struct ServiceState {
    handle: Option<std::thread::JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

/// The host service: owns the socket lifecycle and exposes the operator
/// surface.
pub struct HostService {
    config: HostConfig,
    security: Arc<Mutex<SecurityManager>>,
    registry: Arc<Mutex<SessionRegistry>>,
    backend: Arc<dyn PadBackend>,
    events: mpsc::Sender<HostEvent>,
    running: Arc<AtomicBool>,
    state: Mutex<ServiceState>,
}

impl HostService {
    /// Creates a host service and returns it together with the telemetry
    /// event receiver.
    pub fn new(
        config: HostConfig,
        security_config: SecurityConfig,
        backend: Arc<dyn PadBackend>,
    ) -> (Self, mpsc::Receiver<HostEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let service = Self {
            config,
            security: Arc::new(Mutex::new(SecurityManager::new(security_config))),
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
            backend,
            events: tx,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(ServiceState {
                handle: None,
                local_addr: None,
            }),
        };
        (service, rx)
    }

    /// Binds the socket and starts the receive thread.
    ///
    /// Idempotent: calling `start` while already running returns the bound
    /// address without doing anything.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Bind`] if the socket cannot be bound.
    pub fn start(&self) -> Result<SocketAddr, HostError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.handle.is_some() {
            if let Some(addr) = state.local_addr {
                return Ok(addr);
            }
        }

        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let socket = UdpSocket::bind(addr).map_err(|source| HostError::Bind { addr, source })?;
        socket.set_read_timeout(Some(self.config.recv_timeout)).ok();
        let local_addr = socket
            .local_addr()
            .map_err(|source| HostError::Bind { addr, source })?;

        self.running.store(true, Ordering::Relaxed);
        let router = PadRouter::new(
            self.config.router.clone(),
            Arc::clone(&self.security),
            Arc::clone(&self.backend),
            Arc::clone(&self.registry),
            self.events.clone(),
            Arc::clone(&self.running),
        );
        let running = Arc::clone(&self.running);
        let recv_timeout = self.config.recv_timeout;

        let handle = std::thread::Builder::new()
            .name("padcast-host".to_string())
            .spawn(move || receive_loop(socket, router, running, recv_timeout))
            .expect("failed to spawn host receive thread");

        state.handle = Some(handle);
        state.local_addr = Some(local_addr);
        info!("host listening on UDP {local_addr}");
        Ok(local_addr)
    }

    /// Signals the receive loop to exit and joins it.
    ///
    /// Idempotent: a stopped (or never-started) service is a no-op.  The
    /// loop observes the stop flag at least once per read timeout, so the
    /// join is bounded.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = state.handle.take() {
            let _ = handle.join();
            info!("host stopped");
        }
        state.local_addr = None;
    }

    /// The bound socket address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .local_addr
    }

    /// Whether the receive thread is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self
                .state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .handle
                .is_some()
    }

    // ── Operator surface ──────────────────────────────────────────────────────

    /// Manually blocks a source IP.  Safe to call concurrently with the
    /// receive path.
    pub fn block_ip(&self, ip: std::net::IpAddr, duration: Option<Duration>) {
        self.security
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .block_ip(ip, duration);
    }

    /// Manually lifts an IP block.
    pub fn unblock_ip(&self, ip: std::net::IpAddr) {
        self.security
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unblock_ip(ip);
    }

    /// Read-only security counters.
    pub fn security_stats(&self) -> SecurityStats {
        self.security
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stats()
    }

    /// The most recent security events, oldest first.
    pub fn recent_security_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.security
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recent_events(limit)
    }

    /// Snapshot of all active sessions, ordered by slot.
    pub fn list_active_sessions(&self) -> Vec<SessionSnapshot> {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .all()
    }
}

impl Drop for HostService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The receive loop executed on the host thread.
fn receive_loop(
    socket: UdpSocket,
    mut router: PadRouter,
    running: Arc<AtomicBool>,
    recv_timeout: Duration,
) {
    // Buffer larger than MAX_PACKET_SIZE so oversized frames are seen at
    // their true length and rejected by the decoder, not silently truncated.
    let mut buf = vec![0u8; 2048];
    let mut last_sweep = Instant::now();

    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                router.handle_datagram(&buf[..len], src);
                if last_sweep.elapsed() >= recv_timeout {
                    router.sweep();
                    last_sweep = Instant::now();
                }
            }
            Err(e) if is_timeout_error(&e) => {
                router.sweep();
                last_sweep = Instant::now();
            }
            Err(e) => {
                // Transient socket errors are logged and the loop continues;
                // other sessions must keep functioning.
                error!("host recv error: {e}");
            }
        }
    }

    router.shutdown();
    info!("host receive loop stopped");
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pad_backend::mock::MockPadBackend;

    fn loopback_config() -> HostConfig {
        HostConfig {
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..HostConfig::default()
        }
    }

    fn make_service() -> (HostService, mpsc::Receiver<HostEvent>) {
        HostService::new(
            loopback_config(),
            SecurityConfig::default(),
            Arc::new(MockPadBackend::new()),
        )
    }

    #[test]
    fn test_is_timeout_error_recognises_timed_out() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(is_timeout_error(&e));
    }

    #[test]
    fn test_is_timeout_error_recognises_would_block() {
        let e = std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block");
        assert!(is_timeout_error(&e));
    }

    #[test]
    fn test_is_timeout_error_returns_false_for_other_errors() {
        let e = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_timeout_error(&e));
    }

    #[test]
    fn test_start_binds_ephemeral_port() {
        let (service, _rx) = make_service();

        let addr = service.start().expect("start must bind");
        assert_ne!(addr.port(), 0, "OS must assign a real port");
        assert!(service.is_running());

        service.stop();
        assert!(!service.is_running());
    }

    #[test]
    fn test_start_is_idempotent() {
        let (service, _rx) = make_service();

        let first = service.start().unwrap();
        let second = service.start().unwrap();

        assert_eq!(first, second, "second start must return the same address");
        service.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (service, _rx) = make_service();
        service.start().unwrap();

        service.stop();
        service.stop(); // no-op, must not panic or hang
        assert!(service.local_addr().is_none());
    }

    #[test]
    fn test_service_can_restart_after_stop() {
        let (service, _rx) = make_service();

        let first = service.start().unwrap();
        service.stop();
        let second = service.start().unwrap();

        assert_ne!(second.port(), 0);
        // Ephemeral ports may differ between runs; both must be valid binds.
        let _ = first;
        service.stop();
    }

    #[test]
    fn test_start_fails_on_privileged_port() {
        // Port 1 requires elevated privileges on a normal OS.  When running
        // as root the bind may succeed; the assertion is only that the call
        // returns instead of panicking.
        let config = HostConfig {
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 1,
            ..HostConfig::default()
        };
        let (service, _rx) = HostService::new(
            config,
            SecurityConfig::default(),
            Arc::new(MockPadBackend::new()),
        );
        let result = service.start();
        if result.is_ok() {
            service.stop();
        }
    }
}
