//! Per-session state: the live binding between one remote client identifier
//! and one virtual-controller slot, plus the telemetry math that goes with it.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use crate::application::pads::VirtualPad;

/// Latency samples kept for the jitter estimate.
const LATENCY_WINDOW: usize = 50;

/// Display colours assigned per slot, in slot order.
pub const SLOT_COLORS: [&str; 4] = ["#ef4444", "#3b82f6", "#22c55e", "#eab308"];

/// Returns the generated display label for a slot (slots are 1-based).
pub fn slot_label(slot: usize) -> String {
    format!("Player {slot}")
}

/// Returns the display colour for a slot (slots are 1-based).
pub fn slot_color(slot: usize) -> &'static str {
    SLOT_COLORS[(slot - 1) % SLOT_COLORS.len()]
}

/// Structured telemetry emitted by the orchestrator.
///
/// The host makes no assumption about how these are displayed or stored;
/// the consumer drains them from a bounded channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SessionJoined {
        client_id: u32,
        label: String,
        color: &'static str,
        slot: usize,
    },
    SessionLeft {
        client_id: u32,
        label: String,
        slot: usize,
    },
    SessionStats {
        client_id: u32,
        slot: usize,
        latency_ms: f64,
        jitter_ms: f64,
        rate_hz: f64,
        sequence: u16,
    },
    /// Free-text operational status line.
    Status(String),
}

/// Rolling window of latency samples with a standard-deviation jitter
/// estimate, matching the 50-sample window of the telemetry contract.
#[derive(Debug, Default)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
}

impl LatencyWindow {
    pub fn push(&mut self, latency_ms: f64) {
        if self.samples.len() >= LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Most recent sample, or 0 before any packet arrived.
    pub fn latest(&self) -> f64 {
        self.samples.back().copied().unwrap_or(0.0)
    }

    /// Sample standard deviation over the window; 0 with fewer than two
    /// samples.
    pub fn jitter(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.samples.iter().sum::<f64>() / n as f64;
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean) * (s - mean))
            .sum::<f64>()
            / (n - 1) as f64;
        variance.sqrt()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Receive rate measured over a rolling one-second window.
#[derive(Debug)]
pub struct RateWindow {
    window_start: Instant,
    count: u32,
    last_rate: f64,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
            last_rate: 0.0,
        }
    }
}

impl RateWindow {
    /// Records one received packet and rolls the window when a second has
    /// elapsed.
    pub fn tick(&mut self) {
        self.count += 1;
        let elapsed = self.window_start.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.last_rate = self.count as f64 / elapsed;
            self.window_start = Instant::now();
            self.count = 0;
        }
    }

    /// Packets per second measured over the last completed window.
    pub fn rate_hz(&self) -> f64 {
        self.last_rate
    }
}

/// The live state of one accepted client.
///
/// Owned exclusively by the router on the receive thread.  `pad` is `None`
/// when the session is degraded: the client is still tracked and visible to
/// the operator, but its input is logged instead of applied.
pub struct ClientSession {
    pub client_id: u32,
    /// Last source address, recorded for diagnostics only.  Routing is by
    /// client identifier, never by address: NAT or VPN rebinding changes the
    /// address without changing the logical client.
    pub addr: SocketAddr,
    /// Assigned slot index, 1-based.
    pub slot: usize,
    pub label: String,
    pub color: &'static str,
    pub pad: Option<Box<dyn VirtualPad>>,
    /// Consecutive commit failures; the router degrades the session when
    /// this exceeds its bound.
    pub commit_failures: u32,
    pub last_sequence: Option<u16>,
    pub last_buttons: u16,
    pub last_accepted: Instant,
    pub latency: LatencyWindow,
    pub rate: RateWindow,
    pub last_stats_emit: Instant,
    pub packets: u64,
}

impl ClientSession {
    pub fn new(client_id: u32, addr: SocketAddr, slot: usize, pad: Option<Box<dyn VirtualPad>>) -> Self {
        Self {
            client_id,
            addr,
            slot,
            label: slot_label(slot),
            color: slot_color(slot),
            pad,
            commit_failures: 0,
            last_sequence: None,
            last_buttons: 0,
            last_accepted: Instant::now(),
            latency: LatencyWindow::default(),
            rate: RateWindow::default(),
            last_stats_emit: Instant::now(),
            packets: 0,
        }
    }

    /// Whether the session holds no working pad and only logs its input.
    pub fn is_degraded(&self) -> bool {
        self.pad.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
