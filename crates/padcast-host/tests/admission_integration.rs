//! Integration tests for the security manager's admission lifecycle.
//!
//! These tests exercise the `SecurityManager` through its *public* API in
//! the same way the session orchestrator uses it.  They verify:
//!
//! - The happy path: a fresh client with a fresh timestamp is admitted.
//! - Rate limiting: a client that outruns its bucket is rejected with a
//!   rate-limit reason while an unrelated client on another IP is unaffected.
//! - Violation escalation: enough violations auto-block a client even when
//!   it then presents perfectly valid packets, and the block expires.
//! - The replay window: stale and future origin timestamps are rejected.
//! - The per-IP client cap and the manual block/unblock surface.

use std::net::IpAddr;
use std::time::Duration;

use padcast_core::time::timestamp_ns;
use padcast_host::application::admission::{Rejection, SecurityConfig, SecurityManager};

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A config with rates high enough that buckets never interfere with the
/// check under test.
fn permissive() -> SecurityConfig {
    SecurityConfig {
        client_rate: 1_000_000.0,
        client_burst: 1_000_000.0,
        ip_rate: 1_000_000.0,
        ip_burst: 1_000_000.0,
        ..SecurityConfig::default()
    }
}

#[test]
fn test_fresh_client_with_fresh_timestamp_is_admitted() {
    let mut mgr = SecurityManager::new(SecurityConfig::default());
    assert_eq!(mgr.check(1, ip("10.1.0.1"), timestamp_ns()), Ok(()));
}

/// A client sending faster than its configured rate is rejected with a
/// reason containing "rate limit" once its burst is exhausted, while a
/// previously-unseen client from a different IP is unaffected.
#[test]
fn test_burst_exhaustion_rejects_one_client_but_not_another_ip() {
    let config = SecurityConfig {
        client_rate: 10.0,
        client_burst: 5.0,
        ip_rate: 1_000_000.0,
        ip_burst: 1_000_000.0,
        ..SecurityConfig::default()
    };
    let mut mgr = SecurityManager::new(config);

    // The burst admits five packets back-to-back.
    for i in 0..5 {
        assert_eq!(
            mgr.check(1, ip("10.1.0.1"), timestamp_ns()),
            Ok(()),
            "packet #{i} within burst must be admitted"
        );
    }

    // The sixth is rejected, and the reason names the rate limit.
    let rejection = mgr
        .check(1, ip("10.1.0.1"), timestamp_ns())
        .expect_err("burst must be exhausted");
    assert!(rejection.to_string().contains("rate limit"));

    // A second client behind a different IP starts with its own bucket.
    assert_eq!(mgr.check(2, ip("10.1.0.2"), timestamp_ns()), Ok(()));
}

/// After reaching the violation threshold the client is rejected with a
/// reason containing "blocked" even for a fresh, valid packet; once the
/// block duration elapses the client is admitted again.
#[test]
fn test_violation_threshold_blocks_then_expires() {
    let config = SecurityConfig {
        auto_block_threshold: 5,
        block_duration: Duration::from_millis(80),
        max_timestamp_age: Duration::from_secs(2),
        ..permissive()
    };
    let mut mgr = SecurityManager::new(config);

    // Five stale-timestamp packets accumulate five violations.
    let stale = timestamp_ns() - 10_000_000_000;
    for _ in 0..5 {
        assert_eq!(
            mgr.check(7, ip("10.1.0.1"), stale),
            Err(Rejection::InvalidTimestamp)
        );
    }

    // A perfectly valid packet is now refused because of the block.
    let rejection = mgr
        .check(7, ip("10.1.0.1"), timestamp_ns())
        .expect_err("client must be auto-blocked");
    assert!(rejection.to_string().contains("blocked"));

    // After the block elapses the client is no longer blocked.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(mgr.check(7, ip("10.1.0.1"), timestamp_ns()), Ok(()));
}

/// A packet whose origin timestamp is 3 seconds in the past is rejected
/// under a 2-second age window, with a reason containing "timestamp".
#[test]
fn test_three_second_old_timestamp_rejected_with_two_second_window() {
    let config = SecurityConfig {
        max_timestamp_age: Duration::from_secs(2),
        ..permissive()
    };
    let mut mgr = SecurityManager::new(config);

    let rejection = mgr
        .check(1, ip("10.1.0.1"), timestamp_ns() - 3_000_000_000)
        .expect_err("stale timestamp must be rejected");
    assert!(rejection.to_string().contains("timestamp"));
}

/// A packet stamped 2 seconds in the future is rejected under a 0.5-second
/// future window.
#[test]
fn test_two_second_future_timestamp_rejected_with_half_second_window() {
    let config = SecurityConfig {
        max_timestamp_future: Duration::from_millis(500),
        ..permissive()
    };
    let mut mgr = SecurityManager::new(config);

    assert_eq!(
        mgr.check(1, ip("10.1.0.1"), timestamp_ns() + 2_000_000_000),
        Err(Rejection::InvalidTimestamp)
    );
}

/// A fourth distinct client identifier behind one IP is refused while the
/// first three keep working.
#[test]
fn test_per_ip_client_cap_defaults_to_three() {
    let mut mgr = SecurityManager::new(permissive());
    let nat = ip("192.168.7.7");

    for client_id in 1..=3 {
        assert_eq!(mgr.check(client_id, nat, timestamp_ns()), Ok(()));
    }
    assert_eq!(
        mgr.check(4, nat, timestamp_ns()),
        Err(Rejection::TooManyClientsFromIp)
    );
    assert_eq!(mgr.check(1, nat, timestamp_ns()), Ok(()));
}

#[test]
fn test_manual_ip_block_takes_effect_and_lifts() {
    let mut mgr = SecurityManager::new(permissive());
    let target = ip("10.1.0.9");

    assert_eq!(mgr.check(1, target, timestamp_ns()), Ok(()));

    mgr.block_ip(target, None);
    assert_eq!(
        mgr.check(1, target, timestamp_ns()),
        Err(Rejection::IpBlocked)
    );

    mgr.unblock_ip(target);
    assert_eq!(mgr.check(1, target, timestamp_ns()), Ok(()));
}

#[test]
fn test_stats_and_event_log_are_observable() {
    let mut mgr = SecurityManager::new(permissive());

    mgr.check(1, ip("10.1.0.1"), timestamp_ns()).unwrap();
    mgr.check(2, ip("10.1.0.2"), timestamp_ns()).unwrap();
    mgr.block_ip(ip("10.1.0.3"), None);

    let stats = mgr.stats();
    assert_eq!(stats.total_clients, 2);
    assert_eq!(stats.blocked_ips, 1);
    assert!(stats.recent_events >= 1);

    let events = mgr.recent_events(10);
    assert!(!events.is_empty());
    assert!(events.iter().any(|e| e.ip == ip("10.1.0.3")));
}
