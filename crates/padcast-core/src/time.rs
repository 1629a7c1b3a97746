//! Shared timestamp helper.
//!
//! Both sides of the wire use epoch nanoseconds: the sender stamps each
//! datagram with [`timestamp_ns`], and the host compares that stamp against
//! its own clock for replay-window validation and latency estimation.
//!
//! The comparison is only meaningful when both clocks are reasonably
//! synchronised (same machine, or NTP-synced hosts).  There is no clock-offset
//! negotiation, so `receive_time - origin_timestamp` is an approximate
//! diagnostic, not a round-trip time, and nothing gates correctness on it.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as nanoseconds since the Unix epoch.
pub fn timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ns_is_positive() {
        assert!(timestamp_ns() > 0);
    }

    #[test]
    fn test_timestamp_ns_is_monotone_enough() {
        // Two successive samples must not go backwards by more than clock
        // adjustment noise; in practice they are non-decreasing.
        let a = timestamp_ns();
        let b = timestamp_ns();
        assert!(b >= a, "wall clock went backwards between samples");
    }
}
