//! Admission control: the security manager that decides, before any session
//! state is touched, whether a datagram may enter the pipeline.
//!
//! The checks run in a fixed order and the first failure wins:
//!
//! 1. Whitelist override (when enabled)
//! 2. Active IP block
//! 3. Active client block
//! 4. Replay/staleness window on the origin timestamp
//! 5. Per-IP token bucket
//! 6. Per-client token bucket
//! 7. Per-IP distinct-client cap
//!
//! Rejections in steps 4, 6 and 7 count as violations against the client;
//! enough violations auto-block it for a configurable duration.  Step 5 is
//! deliberately *not* escalated to the client's violation counter: one noisy
//! peer behind a NAT must not get its siblings auto-blocked.
//!
//! The manager owns all of its maps exclusively.  It is shared between the
//! receive thread and operator threads behind an `Arc<Mutex<...>>`; no state
//! leaks out except through the read-only stats/event snapshots.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tracing::{debug, warn};

use padcast_core::time::timestamp_ns;

/// How often the opportunistic housekeeping sweep may run.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the security manager.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Sustained packet rate allowed per client identifier (tokens/second).
    pub client_rate: f64,
    /// Burst capacity of the per-client bucket.
    pub client_burst: f64,
    /// Sustained packet rate allowed per source IP.  Higher than the client
    /// rate so several legitimate clients can share one NAT address.
    pub ip_rate: f64,
    /// Burst capacity of the per-IP bucket.
    pub ip_burst: f64,
    /// Maximum distinct client identifiers tracked per source IP.
    pub max_clients_per_ip: usize,
    /// Violations before a client is auto-blocked.
    pub auto_block_threshold: u32,
    /// How long an auto- or manual block lasts by default.
    pub block_duration: Duration,
    /// Oldest acceptable origin timestamp relative to now.
    pub max_timestamp_age: Duration,
    /// Furthest-future acceptable origin timestamp relative to now.
    pub max_timestamp_future: Duration,
    /// When set, only whitelisted source IPs are admitted at all.
    pub enable_whitelist: bool,
    /// The whitelist consulted when `enable_whitelist` is set.
    pub whitelist: HashSet<IpAddr>,
    /// Client records inactive for this long (and not blocked) are evicted.
    pub inactivity_eviction: Duration,
    /// Bounded capacity of the security event ring.
    pub event_capacity: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            client_rate: 120.0,
            client_burst: 20.0,
            ip_rate: 200.0,
            ip_burst: 20.0,
            max_clients_per_ip: 3,
            auto_block_threshold: 5,
            block_duration: Duration::from_secs(300),
            max_timestamp_age: Duration::from_secs(5),
            max_timestamp_future: Duration::from_secs(1),
            enable_whitelist: false,
            whitelist: HashSet::new(),
            inactivity_eviction: Duration::from_secs(300),
            event_capacity: 1000,
        }
    }
}

/// Why a datagram was refused admission.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("source IP not whitelisted")]
    NotWhitelisted,
    #[error("IP blocked")]
    IpBlocked,
    #[error("client blocked")]
    ClientBlocked,
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("IP rate limit exceeded")]
    IpRateLimit,
    #[error("client rate limit exceeded")]
    ClientRateLimit,
    #[error("too many clients from IP")]
    TooManyClientsFromIp,
}

impl Rejection {
    /// Whether this rejection counts against the client's violation tally.
    fn is_violation(self) -> bool {
        matches!(
            self,
            Rejection::InvalidTimestamp | Rejection::ClientRateLimit | Rejection::TooManyClientsFromIp
        )
    }
}

/// Kind of entry in the security event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Violation,
    AutoBlockClient,
    ManualBlockIp,
    ManualUnblockIp,
    Rejected,
}

/// One entry in the bounded security event ring.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub at: SystemTime,
    pub kind: EventKind,
    pub ip: IpAddr,
    pub client_id: u32,
    pub detail: String,
}

/// Read-only counters for operator introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityStats {
    pub total_clients: usize,
    pub active_clients: usize,
    pub blocked_clients: usize,
    pub blocked_ips: usize,
    pub tracked_ips: usize,
    pub recent_events: usize,
}

/// Token bucket with burst capacity.  One instance per client identifier and
/// one per source IP; mutated only by the admission check.
#[derive(Debug)]
struct TokenBucket {
    rate: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64, burst: f64) -> Self {
        Self {
            rate,
            burst,
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    /// Refills for the elapsed time, then tries to debit `tokens`.
    fn consume(&mut self, tokens: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);

        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }
}

/// Per-client security record.  Created on the first authorized *or*
/// rejected packet; evicted by the sweep once inactive and unblocked.
#[derive(Debug)]
struct ClientRecord {
    client_id: u32,
    ip: IpAddr,
    first_seen: Instant,
    last_seen: Instant,
    packets: u64,
    violations: u32,
    blocked_until: Option<Instant>,
}

impl ClientRecord {
    fn new(client_id: u32, ip: IpAddr) -> Self {
        let now = Instant::now();
        Self {
            client_id,
            ip,
            first_seen: now,
            last_seen: now,
            packets: 0,
            violations: 0,
            blocked_until: None,
        }
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// The security manager.
///
/// Owns the token buckets, block lists, client records and event log
/// exclusively; the session orchestrator interacts with it only through
/// [`check`](Self::check) and the manual override methods.
pub struct SecurityManager {
    config: SecurityConfig,
    clients: HashMap<u32, ClientRecord>,
    ip_clients: HashMap<IpAddr, HashSet<u32>>,
    client_buckets: HashMap<u32, TokenBucket>,
    ip_buckets: HashMap<IpAddr, TokenBucket>,
    blocked_ips: HashMap<IpAddr, Instant>,
    events: VecDeque<SecurityEvent>,
    last_sweep: Instant,
}

impl SecurityManager {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            clients: HashMap::new(),
            ip_clients: HashMap::new(),
            client_buckets: HashMap::new(),
            ip_buckets: HashMap::new(),
            blocked_ips: HashMap::new(),
            events: VecDeque::new(),
            last_sweep: Instant::now(),
        }
    }

    /// Decides whether a datagram from `client_id` at `ip` with the given
    /// origin timestamp may enter the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`Rejection`] in the fixed check order.
    pub fn check(&mut self, client_id: u32, ip: IpAddr, origin_timestamp_ns: u64) -> Result<(), Rejection> {
        let now = Instant::now();

        if now.duration_since(self.last_sweep) > SWEEP_INTERVAL {
            self.sweep(now);
        }

        if self.config.enable_whitelist && !self.config.whitelist.contains(&ip) {
            self.log_event(EventKind::Rejected, ip, client_id, "not whitelisted");
            return Err(Rejection::NotWhitelisted);
        }

        if let Some(&until) = self.blocked_ips.get(&ip) {
            if now < until {
                return Err(Rejection::IpBlocked);
            }
            // Expired block: purge lazily and continue evaluating.
            self.blocked_ips.remove(&ip);
        }

        if let Some(record) = self.clients.get(&client_id) {
            if record.is_blocked(now) {
                return Err(Rejection::ClientBlocked);
            }
        }

        if !self.timestamp_in_window(origin_timestamp_ns) {
            self.record_violation(client_id, ip, Rejection::InvalidTimestamp, now);
            return Err(Rejection::InvalidTimestamp);
        }

        let ip_ok = self
            .ip_buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.config.ip_rate, self.config.ip_burst))
            .consume(1.0);
        if !ip_ok {
            // Deliberately not a client violation: siblings behind the same
            // NAT must not be collectively punished.
            self.log_event(EventKind::Rejected, ip, client_id, "ip rate limit");
            return Err(Rejection::IpRateLimit);
        }

        let client_ok = self
            .client_buckets
            .entry(client_id)
            .or_insert_with(|| TokenBucket::new(self.config.client_rate, self.config.client_burst))
            .consume(1.0);
        if !client_ok {
            self.record_violation(client_id, ip, Rejection::ClientRateLimit, now);
            return Err(Rejection::ClientRateLimit);
        }

        if !self.admit_client_to_ip(client_id, ip) {
            self.record_violation(client_id, ip, Rejection::TooManyClientsFromIp, now);
            return Err(Rejection::TooManyClientsFromIp);
        }

        let record = self
            .clients
            .entry(client_id)
            .or_insert_with(|| ClientRecord::new(client_id, ip));
        record.last_seen = now;
        record.ip = ip;
        record.packets += 1;

        Ok(())
    }

    /// Manually blocks an IP address.  `duration` defaults to the configured
    /// block duration.
    pub fn block_ip(&mut self, ip: IpAddr, duration: Option<Duration>) {
        let duration = duration.unwrap_or(self.config.block_duration);
        self.blocked_ips.insert(ip, Instant::now() + duration);
        self.log_event(
            EventKind::ManualBlockIp,
            ip,
            0,
            &format!("duration={}s", duration.as_secs()),
        );
    }

    /// Manually lifts an IP block, if present.
    pub fn unblock_ip(&mut self, ip: IpAddr) {
        if self.blocked_ips.remove(&ip).is_some() {
            self.log_event(EventKind::ManualUnblockIp, ip, 0, "");
        }
    }

    /// Read-only counters for operator display.
    pub fn stats(&self) -> SecurityStats {
        let now = Instant::now();
        let active_window = Duration::from_secs(60);

        SecurityStats {
            total_clients: self.clients.len(),
            active_clients: self
                .clients
                .values()
                .filter(|c| now.duration_since(c.last_seen) < active_window)
                .count(),
            blocked_clients: self.clients.values().filter(|c| c.is_blocked(now)).count(),
            blocked_ips: self.blocked_ips.values().filter(|&&until| now < until).count(),
            tracked_ips: self.ip_clients.len(),
            recent_events: self.events.len(),
        }
    }

    /// The most recent `limit` security events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<SecurityEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn timestamp_in_window(&self, origin_timestamp_ns: u64) -> bool {
        let now_ns = timestamp_ns();
        let age_secs = (now_ns as i128 - origin_timestamp_ns as i128) as f64 / 1e9;

        age_secs <= self.config.max_timestamp_age.as_secs_f64()
            && age_secs >= -self.config.max_timestamp_future.as_secs_f64()
    }

    /// Admits `client_id` into `ip`'s tracked set, refusing when the set is
    /// full and the client is new to that address.
    fn admit_client_to_ip(&mut self, client_id: u32, ip: IpAddr) -> bool {
        let clients = self.ip_clients.entry(ip).or_default();
        if clients.contains(&client_id) {
            return true;
        }
        if clients.len() >= self.config.max_clients_per_ip {
            return false;
        }
        clients.insert(client_id);
        true
    }

    fn record_violation(&mut self, client_id: u32, ip: IpAddr, reason: Rejection, now: Instant) {
        debug_assert!(reason.is_violation());

        // The record is created here if this client has never been seen
        // before: a rejected first packet still starts its history.
        let record = self
            .clients
            .entry(client_id)
            .or_insert_with(|| ClientRecord::new(client_id, ip));
        record.last_seen = now;
        record.violations += 1;

        let threshold_reached = record.violations >= self.config.auto_block_threshold;
        if threshold_reached {
            record.blocked_until = Some(now + self.config.block_duration);
        }

        self.log_event(EventKind::Violation, ip, client_id, &reason.to_string());
        if threshold_reached {
            warn!(client_id, %ip, "violation threshold reached, client auto-blocked");
            self.log_event(
                EventKind::AutoBlockClient,
                ip,
                client_id,
                &format!("after {reason}"),
            );
        }
    }

    fn log_event(&mut self, kind: EventKind, ip: IpAddr, client_id: u32, detail: &str) {
        if self.events.len() >= self.config.event_capacity {
            self.events.pop_front();
        }
        self.events.push_back(SecurityEvent {
            at: SystemTime::now(),
            kind,
            ip,
            client_id,
            detail: detail.to_string(),
        });
    }

    /// Housekeeping: purge expired IP blocks, evict inactive unblocked
    /// clients together with their buckets, drop empty per-IP sets.  Keeps a
    /// churn of ephemeral client identifiers from growing the maps forever.
    fn sweep(&mut self, now: Instant) {
        self.last_sweep = now;

        self.blocked_ips.retain(|_, until| now < *until);

        let eviction = self.config.inactivity_eviction;
        let evicted: Vec<u32> = self
            .clients
            .values()
            .filter(|c| now.duration_since(c.last_seen) > eviction && !c.is_blocked(now))
            .map(|c| c.client_id)
            .collect();

        for client_id in evicted {
            if let Some(record) = self.clients.remove(&client_id) {
                if let Some(set) = self.ip_clients.get_mut(&record.ip) {
                    set.remove(&client_id);
                }
            }
            self.client_buckets.remove(&client_id);
            debug!(client_id, "evicted inactive client record");
        }

        let empty_ips: Vec<IpAddr> = self
            .ip_clients
            .iter()
            .filter(|(_, set)| set.is_empty())
            .map(|(ip, _)| *ip)
            .collect();
        for ip in empty_ips {
            self.ip_clients.remove(&ip);
            self.ip_buckets.remove(&ip);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
