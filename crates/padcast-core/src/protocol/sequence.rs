//! Modular arithmetic for the 16-bit wire sequence number.
//!
//! Sequence numbers identify individual datagrams so the host can drop exact
//! duplicates.  The counter is deliberately small (16 bits) and wraps, so all
//! comparisons must use wraparound-aware arithmetic: `delta(2, 0xFFFE)` is 4,
//! not a large negative number.  Raw subtraction is never correct here.
//!
//! The host does not require sequences to be monotonic.  Reordering and gaps
//! are tolerated: every non-duplicate datagram becomes the new
//! baseline, because the newest arriving full-state snapshot simply wins.

use std::sync::atomic::{AtomicU16, Ordering};

/// Modular distance from `last` to `current` in the 16-bit sequence space.
///
/// A result of 0 means `current` is an exact duplicate of `last`.  Any other
/// value (including "backwards" deltas near `u16::MAX`) marks a distinct
/// datagram.
pub fn delta(current: u16, last: u16) -> u16 {
    current.wrapping_sub(last)
}

/// A thread-safe, wrapping counter producing outbound sequence numbers.
///
/// The first call to [`next`](Self::next) returns 0; the counter wraps from
/// `u16::MAX` back to 0 without panicking.
///
/// `Ordering::Relaxed` is sufficient: sequence numbers only label datagrams,
/// they do not synchronise memory between threads.
pub struct SequenceCounter {
    inner: AtomicU16,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU16::new(0),
        }
    }

    /// Returns the next sequence number and advances the counter.
    pub fn next(&self) -> u16 {
        // fetch_add returns the value before the addition; u16 arithmetic
        // wraps naturally at the type boundary.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the current value without advancing.  Diagnostic only.
    pub fn current(&self) -> u16 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
