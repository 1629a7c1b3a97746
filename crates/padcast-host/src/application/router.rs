//! The session orchestrator: routes validated datagrams to virtual-pad
//! slots.
//!
//! The router owns the session map and slot table exclusively and runs only
//! on the receive thread, so none of its state needs a lock.  Everything it
//! shares with operator threads goes through two synchronised boundaries:
//! the [`SecurityManager`] mutex and the [`SessionRegistry`] snapshot mutex.
//!
//! Per-datagram pipeline, executed synchronously:
//!
//! 1. Decode (malformed input is dropped with throttled logging, never fatal).
//! 2. Admission check against the security manager.
//! 3. Session lookup or join, keyed by client identifier, never by source
//!    address, which NAT/VPN can change mid-session.
//! 4. Modular duplicate-sequence drop.
//! 5. Button-diff apply + absolute axes/triggers + commit.
//! 6. Telemetry bookkeeping, emitted at most once per second per session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use padcast_core::protocol::{codec, sequence};
use padcast_core::time::timestamp_ns;

use crate::application::admission::SecurityManager;
use crate::application::pads::{apply_frame, PadBackend, VirtualPad};
use crate::application::registry::{SessionRegistry, SessionSnapshot};
use crate::application::session::{ClientSession, HostEvent};

/// Slot count in multi-slot mode, matching common virtual-controller
/// hardware limits.
pub const MAX_SLOTS: usize = 4;

/// Operating mode, selected at startup and never changed mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// The first client identifier seen owns the sole virtual controller;
    /// packets from any other identifier are silently ignored until a short
    /// liveness timeout clears the owner.
    SingleOwner,
    /// Up to [`MAX_SLOTS`] independent sessions, one virtual controller
    /// each, keyed by client identifier.
    MultiSlot,
}

/// Tunables for the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub mode: HostMode,
    pub max_slots: usize,
    /// A session silent for longer than this is evicted by the sweep.
    pub liveness_timeout: Duration,
    /// Total pad-creation attempts before a session degrades.
    pub pad_create_attempts: u32,
    /// Sleep between pad-creation attempts; interruptible by the stop flag.
    pub pad_retry_backoff: Duration,
    /// Consecutive commit failures before a session's pad is released.
    pub max_commit_failures: u32,
    /// Minimum interval between per-session stats emissions.
    pub stats_interval: Duration,
}

impl RouterConfig {
    /// Default tunables for the given mode.
    pub fn for_mode(mode: HostMode) -> Self {
        let (max_slots, liveness_timeout) = match mode {
            HostMode::SingleOwner => (1, Duration::from_millis(500)),
            HostMode::MultiSlot => (MAX_SLOTS, Duration::from_secs(10)),
        };
        Self {
            mode,
            max_slots,
            liveness_timeout,
            pad_create_attempts: 3,
            pad_retry_backoff: Duration::from_millis(100),
            max_commit_failures: 3,
            stats_interval: Duration::from_secs(1),
        }
    }
}

/// Suppresses repeated log lines for high-frequency failure paths.
struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    fn allow(&mut self) -> bool {
        match self.last {
            Some(at) if at.elapsed() < self.interval => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }
}

/// The session orchestrator.  Owned and driven by the receive loop.
pub struct PadRouter {
    config: RouterConfig,
    security: Arc<Mutex<SecurityManager>>,
    backend: Arc<dyn PadBackend>,
    registry: Arc<Mutex<SessionRegistry>>,
    events: mpsc::Sender<HostEvent>,
    running: Arc<AtomicBool>,
    sessions: HashMap<u32, ClientSession>,
    /// `slots[i]` holds the client occupying slot `i + 1`.
    slots: Vec<Option<u32>>,
    decode_log: LogThrottle,
    reject_log: LogThrottle,
    capacity_log: LogThrottle,
}

impl PadRouter {
    pub fn new(
        config: RouterConfig,
        security: Arc<Mutex<SecurityManager>>,
        backend: Arc<dyn PadBackend>,
        registry: Arc<Mutex<SessionRegistry>>,
        events: mpsc::Sender<HostEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let slots = vec![None; config.max_slots];
        Self {
            config,
            security,
            backend,
            registry,
            events,
            running,
            sessions: HashMap::new(),
            slots,
            decode_log: LogThrottle::new(Duration::from_secs(1)),
            reject_log: LogThrottle::new(Duration::from_secs(1)),
            capacity_log: LogThrottle::new(Duration::from_secs(5)),
        }
    }

    /// Processes one received datagram.  Never panics and never blocks
    /// beyond the bounded pad-creation backoff at join time.
    pub fn handle_datagram(&mut self, data: &[u8], src: SocketAddr) {
        let state = match codec::decode(data) {
            Ok(state) => state,
            Err(e) => {
                if self.decode_log.allow() {
                    debug!(%src, "dropping malformed datagram: {e}");
                }
                return;
            }
        };

        let verdict = self
            .security
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(state.client_id, src.ip(), state.timestamp_ns);
        if let Err(rejection) = verdict {
            if self.reject_log.allow() {
                warn!(client_id = state.client_id, %src, "datagram rejected: {rejection}");
            }
            return;
        }

        if !self.sessions.contains_key(&state.client_id) && !self.try_join(state.client_id, src) {
            return;
        }
        let Some(session) = self.sessions.get_mut(&state.client_id) else {
            return;
        };
        session.addr = src;

        // Duplicate drop only; reordering and gaps are accepted as the new
        // baseline, because the newest arriving full-state snapshot wins.
        if let Some(last) = session.last_sequence {
            if sequence::delta(state.sequence, last) == 0 {
                return;
            }
        }
        session.last_sequence = Some(state.sequence);
        session.last_accepted = Instant::now();
        session.packets += 1;

        let latency_ms = (timestamp_ns() as i128 - state.timestamp_ns as i128) as f64 / 1e6;
        session.latency.push(latency_ms);
        session.rate.tick();

        match session.pad.as_mut() {
            Some(pad) => match apply_frame(pad.as_mut(), session.last_buttons, &state) {
                Ok(()) => {
                    session.last_buttons = state.buttons;
                    session.commit_failures = 0;
                }
                Err(e) => {
                    session.commit_failures += 1;
                    warn!(
                        client_id = session.client_id,
                        failures = session.commit_failures,
                        "pad apply failed: {e}"
                    );
                    if session.commit_failures >= self.config.max_commit_failures {
                        if let Some(mut pad) = session.pad.take() {
                            let _ = pad.reset();
                        }
                        warn!(
                            client_id = session.client_id,
                            slot = session.slot,
                            "pad released after repeated commit failures; session degraded to logging only"
                        );
                    }
                }
            },
            None => {
                debug!(
                    client_id = session.client_id,
                    seq = state.sequence,
                    buttons = format_args!("{:#06x}", state.buttons),
                    "degraded session, input logged only"
                );
            }
        }

        if session.last_stats_emit.elapsed() >= self.config.stats_interval {
            session.last_stats_emit = Instant::now();
            let _ = self.events.try_send(HostEvent::SessionStats {
                client_id: session.client_id,
                slot: session.slot,
                latency_ms: session.latency.latest(),
                jitter_ms: session.latency.jitter(),
                rate_hz: session.rate.rate_hz(),
                sequence: state.sequence,
            });
            let snapshot = snapshot_of(session);
            self.registry
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .upsert(snapshot);
        }
    }

    /// Evicts sessions silent for longer than the liveness window.  Run once
    /// per idle receive-timeout tick and opportunistically under load.
    pub fn sweep(&mut self) {
        let timeout = self.config.liveness_timeout;
        let expired: Vec<u32> = self
            .sessions
            .values()
            .filter(|s| s.last_accepted.elapsed() > timeout)
            .map(|s| s.client_id)
            .collect();
        for client_id in expired {
            self.evict(client_id, "liveness timeout");
        }
    }

    /// Forcibly removes a session: resets the pad to neutral, releases it,
    /// frees the slot, and emits a left notification.
    pub fn evict(&mut self, client_id: u32, reason: &str) {
        let Some(mut session) = self.sessions.remove(&client_id) else {
            return;
        };
        if let Some(pad) = session.pad.as_mut() {
            if let Err(e) = pad.reset() {
                warn!(client_id, "pad reset on eviction failed: {e}");
            }
        }
        if let Some(entry) = self.slots.get_mut(session.slot - 1) {
            *entry = None;
        }
        info!(client_id, slot = session.slot, "session left ({reason})");
        let _ = self.events.try_send(HostEvent::SessionLeft {
            client_id,
            label: session.label.clone(),
            slot: session.slot,
        });
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(client_id);
    }

    /// Resets and releases every pad.  Called when the receive loop exits.
    pub fn shutdown(&mut self) {
        let client_ids: Vec<u32> = self.sessions.keys().copied().collect();
        for client_id in client_ids {
            self.evict(client_id, "host stopping");
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Tries to bind a new client to a slot.  Returns `false` when the
    /// datagram should be dropped instead.
    fn try_join(&mut self, client_id: u32, src: SocketAddr) -> bool {
        if self.config.mode == HostMode::SingleOwner && !self.sessions.is_empty() {
            // Not the owner.  Ignored without logging: this is expected
            // steady-state traffic, not an anomaly.
            return false;
        }

        let Some(slot_index) = self.slots.iter().position(Option::is_none) else {
            if self.capacity_log.allow() {
                warn!(
                    client_id,
                    max_slots = self.config.max_slots,
                    "all slots occupied, dropping new client"
                );
            }
            return false;
        };
        let slot = slot_index + 1;

        let pad = self.create_pad(client_id);
        let session = ClientSession::new(client_id, src, slot, pad);
        self.slots[slot_index] = Some(client_id);

        info!(client_id, slot, label = %session.label, "session joined");
        if self.config.mode == HostMode::SingleOwner {
            let _ = self
                .events
                .try_send(HostEvent::Status(format!("owner set to {client_id}")));
        }
        let _ = self.events.try_send(HostEvent::SessionJoined {
            client_id,
            label: session.label.clone(),
            color: session.color,
            slot,
        });
        let snapshot = snapshot_of(&session);
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .upsert(snapshot);
        self.sessions.insert(client_id, session);
        true
    }

    /// Creates a virtual pad with bounded, stop-interruptible retries.
    /// Returns `None` when the backend stays unavailable: the session is
    /// still tracked for diagnostics, its input logged rather than applied.
    fn create_pad(&self, client_id: u32) -> Option<Box<dyn VirtualPad>> {
        for attempt in 1..=self.config.pad_create_attempts {
            match self.backend.create() {
                Ok(pad) => return Some(pad),
                Err(e) => {
                    warn!(client_id, attempt, "virtual pad creation failed: {e}");
                    if attempt < self.config.pad_create_attempts {
                        if !self.running.load(Ordering::Relaxed) {
                            return None;
                        }
                        std::thread::sleep(self.config.pad_retry_backoff);
                    }
                }
            }
        }
        warn!(
            client_id,
            "pad backend exhausted retries; session degraded to logging only"
        );
        None
    }
}

fn snapshot_of(session: &ClientSession) -> SessionSnapshot {
    SessionSnapshot {
        client_id: session.client_id,
        label: session.label.clone(),
        color: session.color,
        slot: session.slot,
        addr: session.addr,
        latency_ms: session.latency.latest(),
        jitter_ms: session.latency.jitter(),
        rate_hz: session.rate.rate_hz(),
        last_sequence: session.last_sequence.unwrap_or(0),
        degraded: session.is_degraded(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::admission::SecurityConfig;
    use crate::infrastructure::pad_backend::mock::MockPadBackend;
    use padcast_core::protocol::state::buttons;
    use padcast_core::PadState;

    fn permissive_security() -> SecurityConfig {
        SecurityConfig {
            client_rate: 1_000_000.0,
            client_burst: 1_000_000.0,
            ip_rate: 1_000_000.0,
            ip_burst: 1_000_000.0,
            max_clients_per_ip: 100,
            ..SecurityConfig::default()
        }
    }

    fn fast_config(mode: HostMode) -> RouterConfig {
        RouterConfig {
            pad_retry_backoff: Duration::from_millis(1),
            ..RouterConfig::for_mode(mode)
        }
    }

    struct Fixture {
        router: PadRouter,
        backend: Arc<MockPadBackend>,
        events: mpsc::Receiver<HostEvent>,
        registry: Arc<Mutex<SessionRegistry>>,
    }

    fn make_fixture(config: RouterConfig) -> Fixture {
        let backend = Arc::new(MockPadBackend::new());
        let registry = Arc::new(Mutex::new(SessionRegistry::new()));
        let security = Arc::new(Mutex::new(SecurityManager::new(permissive_security())));
        let (tx, rx) = mpsc::channel(64);
        let router = PadRouter::new(
            config,
            security,
            Arc::clone(&backend) as Arc<dyn PadBackend>,
            Arc::clone(&registry),
            tx,
            Arc::new(AtomicBool::new(true)),
        );
        Fixture {
            router,
            backend,
            events: rx,
            registry,
        }
    }

    fn src(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn datagram(client_id: u32, seq: u16, held: u16) -> Vec<u8> {
        let mut state = PadState::neutral(client_id, seq);
        state.buttons = held;
        codec::encode(&state)
    }

    fn drain(rx: &mut mpsc::Receiver<HostEvent>) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ── Decode and admission ──────────────────────────────────────────────────

    #[test]
    fn test_malformed_datagram_is_dropped_without_session() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        fx.router.handle_datagram(&[0u8; 5], src(9000));

        assert_eq!(fx.router.session_count(), 0);
    }

    #[test]
    fn test_rejected_datagram_creates_no_session() {
        // Arrange – a security manager that rejects everything via whitelist.
        let security_config = SecurityConfig {
            enable_whitelist: true,
            ..permissive_security()
        };
        let backend = Arc::new(MockPadBackend::new());
        let registry = Arc::new(Mutex::new(SessionRegistry::new()));
        let (tx, _rx) = mpsc::channel(64);
        let mut router = PadRouter::new(
            fast_config(HostMode::MultiSlot),
            Arc::new(Mutex::new(SecurityManager::new(security_config))),
            backend as Arc<dyn PadBackend>,
            registry,
            tx,
            Arc::new(AtomicBool::new(true)),
        );

        // Act
        router.handle_datagram(&datagram(1, 0, 0), src(9000));

        // Assert
        assert_eq!(router.session_count(), 0);
    }

    // ── Sequence handling ─────────────────────────────────────────────────────

    #[test]
    fn test_duplicate_sequence_is_applied_once() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        fx.router.handle_datagram(&datagram(1, 1, buttons::A), src(9000));
        fx.router.handle_datagram(&datagram(1, 2, buttons::A), src(9000));
        fx.router.handle_datagram(&datagram(1, 2, buttons::A), src(9000));

        // Two distinct sequences, one duplicate: exactly two committed frames.
        let probes = fx.backend.probes();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].commit_count(), 2);
    }

    #[test]
    fn test_reordered_sequence_is_accepted_as_new_baseline() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        // An out-of-order (older) sequence has a nonzero modular delta and
        // wins anyway: lost packets are not retransmitted, newest state wins.
        fx.router.handle_datagram(&datagram(1, 5, 0), src(9000));
        fx.router.handle_datagram(&datagram(1, 3, 0), src(9000));

        let probes = fx.backend.probes();
        assert_eq!(probes[0].commit_count(), 2);
    }

    #[test]
    fn test_wrapped_sequence_is_accepted() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        fx.router.handle_datagram(&datagram(1, u16::MAX, 0), src(9000));
        fx.router.handle_datagram(&datagram(1, 0, 0), src(9000));

        let probes = fx.backend.probes();
        assert_eq!(probes[0].commit_count(), 2);
    }

    // ── Button diffing through the pipeline ───────────────────────────────────

    #[test]
    fn test_button_transitions_press_and_release_only_changes() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        fx.router.handle_datagram(&datagram(1, 1, buttons::A), src(9000));
        fx.router
            .handle_datagram(&datagram(1, 2, buttons::A | buttons::B), src(9000));
        fx.router.handle_datagram(&datagram(1, 3, 0), src(9000));

        let probes = fx.backend.probes();
        assert_eq!(probes[0].presses(), vec![buttons::A, buttons::B]);
        assert_eq!(probes[0].releases(), vec![buttons::A, buttons::B]);
        assert_eq!(probes[0].commit_count(), 3);
    }

    // ── Single-owner mode ─────────────────────────────────────────────────────

    #[test]
    fn test_single_owner_first_client_claims_ownership() {
        let mut fx = make_fixture(fast_config(HostMode::SingleOwner));

        fx.router.handle_datagram(&datagram(10, 0, 0), src(9000));

        assert_eq!(fx.router.session_count(), 1);
        let events = drain(&mut fx.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, HostEvent::SessionJoined { client_id: 10, slot: 1, .. })));
    }

    #[test]
    fn test_single_owner_ignores_other_clients() {
        let mut fx = make_fixture(fast_config(HostMode::SingleOwner));

        fx.router.handle_datagram(&datagram(10, 0, 0), src(9000));
        fx.router.handle_datagram(&datagram(11, 0, buttons::A), src(9001));

        assert_eq!(fx.router.session_count(), 1);
        // Only the owner's pad exists; the stranger never touched anything.
        assert_eq!(fx.backend.probes().len(), 1);
    }

    #[test]
    fn test_single_owner_timeout_clears_ownership_for_next_claim() {
        let mut fx = make_fixture(fast_config(HostMode::SingleOwner));

        fx.router.handle_datagram(&datagram(10, 0, 0), src(9000));

        // Age the owner past the liveness window, then sweep.
        fx.router.sessions.get_mut(&10).unwrap().last_accepted =
            Instant::now() - Duration::from_secs(1);
        fx.router.sweep();
        assert_eq!(fx.router.session_count(), 0);

        // The next packet from any client claims ownership.
        fx.router.handle_datagram(&datagram(11, 0, 0), src(9001));
        assert_eq!(fx.router.session_count(), 1);
        assert!(fx.router.sessions.contains_key(&11));
    }

    // ── Multi-slot capacity and lifecycle ─────────────────────────────────────

    #[test]
    fn test_multi_slot_assigns_sequential_slots() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        for client_id in 1..=4u32 {
            fx.router
                .handle_datagram(&datagram(client_id, 0, 0), src(9000 + client_id as u16));
        }

        assert_eq!(fx.router.session_count(), 4);
        for (client_id, expected_slot) in (1..=4u32).zip(1..=4usize) {
            assert_eq!(fx.router.sessions[&client_id].slot, expected_slot);
        }
    }

    #[test]
    fn test_fifth_client_is_refused_until_a_slot_frees() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        for client_id in 1..=4u32 {
            fx.router
                .handle_datagram(&datagram(client_id, 0, 0), src(9000 + client_id as u16));
        }

        // Fifth distinct client: dropped, first four untouched.
        fx.router.handle_datagram(&datagram(5, 0, 0), src(9005));
        assert_eq!(fx.router.session_count(), 4);
        assert!(!fx.router.sessions.contains_key(&5));

        // Free slot 2 via liveness timeout.
        fx.router.sessions.get_mut(&2).unwrap().last_accepted =
            Instant::now() - Duration::from_secs(60);
        fx.router.sweep();
        assert_eq!(fx.router.session_count(), 3);

        // The fifth client now joins, reusing the lowest free slot.
        fx.router.handle_datagram(&datagram(5, 0, 0), src(9005));
        assert_eq!(fx.router.sessions[&5].slot, 2);
    }

    #[test]
    fn test_eviction_resets_pad_and_emits_left_event() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));
        fx.router.handle_datagram(&datagram(1, 0, buttons::A), src(9000));

        fx.router.evict(1, "test");

        let probes = fx.backend.probes();
        assert_eq!(probes[0].reset_count(), 1, "pad reset to neutral on eviction");
        let events = drain(&mut fx.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, HostEvent::SessionLeft { client_id: 1, slot: 1, .. })));
        assert!(fx.registry.lock().unwrap().is_empty());
    }

    #[test]
    fn test_session_routed_by_client_id_across_address_change() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));

        fx.router.handle_datagram(&datagram(1, 1, 0), src(9000));
        fx.router.handle_datagram(&datagram(1, 2, 0), src(9500));

        // Still one session; the new address was recorded for diagnostics.
        assert_eq!(fx.router.session_count(), 1);
        assert_eq!(fx.router.sessions[&1].addr, src(9500));
    }

    // ── Backend failure handling ──────────────────────────────────────────────

    #[test]
    fn test_create_retry_succeeds_after_transient_failures() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));
        fx.backend.fail_next_creates(2); // attempts 1 and 2 fail, 3 succeeds

        fx.router.handle_datagram(&datagram(1, 0, 0), src(9000));

        assert_eq!(fx.router.session_count(), 1);
        assert!(!fx.router.sessions[&1].is_degraded());
        assert_eq!(fx.backend.probes().len(), 1);
    }

    #[test]
    fn test_create_retry_exhaustion_degrades_session() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));
        fx.backend.fail_next_creates(3); // all attempts fail

        fx.router.handle_datagram(&datagram(1, 1, buttons::A), src(9000));
        fx.router.handle_datagram(&datagram(1, 2, buttons::B), src(9000));

        // Still tracked for diagnostics, but no pad was ever created.
        assert_eq!(fx.router.session_count(), 1);
        assert!(fx.router.sessions[&1].is_degraded());
        assert!(fx.backend.probes().is_empty());

        let registry = fx.registry.lock().unwrap();
        assert!(registry.get(1).unwrap().degraded);
    }

    #[test]
    fn test_repeated_commit_failures_degrade_session() {
        let config = RouterConfig {
            max_commit_failures: 3,
            ..fast_config(HostMode::MultiSlot)
        };
        let mut fx = make_fixture(config);

        fx.router.handle_datagram(&datagram(1, 1, 0), src(9000));
        assert!(!fx.router.sessions[&1].is_degraded());

        fx.backend.probes()[0].set_fail_commit(true);
        for seq in 2..=4 {
            fx.router.handle_datagram(&datagram(1, seq, 0), src(9000));
        }

        // The pad was released after three consecutive failures; the
        // session persists, and further packets are only logged.
        assert!(fx.router.sessions[&1].is_degraded());
        fx.router.handle_datagram(&datagram(1, 5, 0), src(9000));
        assert_eq!(fx.router.session_count(), 1);
    }

    #[test]
    fn test_commit_failure_of_one_session_leaves_others_working() {
        let config = RouterConfig {
            max_commit_failures: 1,
            ..fast_config(HostMode::MultiSlot)
        };
        let mut fx = make_fixture(config);

        fx.router.handle_datagram(&datagram(1, 1, 0), src(9000));
        fx.router.handle_datagram(&datagram(2, 1, 0), src(9001));
        fx.backend.probes()[0].set_fail_commit(true);

        fx.router.handle_datagram(&datagram(1, 2, 0), src(9000));
        fx.router.handle_datagram(&datagram(2, 2, 0), src(9001));

        assert!(fx.router.sessions[&1].is_degraded());
        assert!(!fx.router.sessions[&2].is_degraded());
        assert_eq!(fx.backend.probes()[1].commit_count(), 2);
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    #[test]
    fn test_shutdown_releases_all_sessions() {
        let mut fx = make_fixture(fast_config(HostMode::MultiSlot));
        fx.router.handle_datagram(&datagram(1, 0, 0), src(9000));
        fx.router.handle_datagram(&datagram(2, 0, 0), src(9001));

        fx.router.shutdown();

        assert_eq!(fx.router.session_count(), 0);
        for probe in fx.backend.probes() {
            assert_eq!(probe.reset_count(), 1);
        }
        assert!(fx.registry.lock().unwrap().is_empty());
    }
}
