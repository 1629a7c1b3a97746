//! Mock pad backend for unit and integration testing.
//!
//! Real backends drive OS driver APIs that need a loaded kernel module or a
//! desktop session and cannot be observed from test code.  The mock replaces
//! every OS call with in-memory recording: each created pad shares a
//! [`PadProbe`] with the backend, so tests can inspect exactly what was
//! emitted and in what order after the pad itself has been moved into a
//! session.
//!
//! Failure injection:
//! - [`MockPadBackend::fail_next_creates`] makes the next N `create` calls
//!   fail, for exercising the join-time retry path.
//! - [`PadProbe::set_fail_commit`] makes a live pad's `commit` fail, for
//!   exercising the degraded-session path.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::pads::{PadBackend, PadError, VirtualPad};

/// Shared recording target for one created pad.
#[derive(Default)]
pub struct PadProbe {
    presses: Mutex<Vec<u16>>,
    releases: Mutex<Vec<u16>>,
    sticks: Mutex<Vec<(i16, i16, i16, i16)>>,
    triggers: Mutex<Vec<(u8, u8)>>,
    commits: AtomicU32,
    resets: AtomicU32,
    fail_commit: AtomicBool,
}

impl PadProbe {
    pub fn presses(&self) -> Vec<u16> {
        self.presses.lock().unwrap().clone()
    }

    pub fn releases(&self) -> Vec<u16> {
        self.releases.lock().unwrap().clone()
    }

    pub fn sticks(&self) -> Vec<(i16, i16, i16, i16)> {
        self.sticks.lock().unwrap().clone()
    }

    pub fn triggers(&self) -> Vec<(u8, u8)> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn commit_count(&self) -> u32 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn reset_count(&self) -> u32 {
        self.resets.load(Ordering::Relaxed)
    }

    /// Makes subsequent `commit` calls on this pad fail.
    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::Relaxed);
    }
}

/// A pad that records every call into its shared probe.
pub struct MockPad {
    probe: Arc<PadProbe>,
}

impl VirtualPad for MockPad {
    fn press_button(&mut self, bit: u16) -> Result<(), PadError> {
        self.probe.presses.lock().unwrap().push(bit);
        Ok(())
    }

    fn release_button(&mut self, bit: u16) -> Result<(), PadError> {
        self.probe.releases.lock().unwrap().push(bit);
        Ok(())
    }

    fn set_sticks(&mut self, lx: i16, ly: i16, rx: i16, ry: i16) -> Result<(), PadError> {
        self.probe.sticks.lock().unwrap().push((lx, ly, rx, ry));
        Ok(())
    }

    fn set_triggers(&mut self, lt: u8, rt: u8) -> Result<(), PadError> {
        self.probe.triggers.lock().unwrap().push((lt, rt));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PadError> {
        if self.probe.fail_commit.load(Ordering::Relaxed) {
            return Err(PadError::Backend("mock commit failure".to_string()));
        }
        self.probe.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PadError> {
        self.probe.resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Backend that hands out [`MockPad`]s and keeps a probe per created pad.
#[derive(Default)]
pub struct MockPadBackend {
    probes: Mutex<Vec<Arc<PadProbe>>>,
    fail_creates: AtomicU32,
}

impl MockPadBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to `create` fail with
    /// [`PadError::Unavailable`].
    pub fn fail_next_creates(&self, count: u32) {
        self.fail_creates.store(count, Ordering::Relaxed);
    }

    /// Probes of every successfully created pad, in creation order.
    pub fn probes(&self) -> Vec<Arc<PadProbe>> {
        self.probes.lock().unwrap().clone()
    }
}

impl PadBackend for MockPadBackend {
    fn create(&self) -> Result<Box<dyn VirtualPad>, PadError> {
        let remaining = self.fail_creates.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_creates.store(remaining - 1, Ordering::Relaxed);
            return Err(PadError::Unavailable);
        }

        let probe = Arc::new(PadProbe::default());
        self.probes.lock().unwrap().push(Arc::clone(&probe));
        Ok(Box::new(MockPad { probe }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
