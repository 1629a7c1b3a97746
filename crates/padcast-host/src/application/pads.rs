//! The virtual-pad seam: the narrow interface the host drives and the
//! per-frame application contract.
//!
//! The OS-level drivers that make a synthetic controller visible to other
//! software (ViGEm on Windows, uinput on Linux) are external collaborators.
//! This module only defines the capability they must provide and how one
//! decoded [`PadState`] is turned into calls against it.

use padcast_core::PadState;
use thiserror::Error;

/// Error type for virtual-pad operations.
#[derive(Debug, Error)]
pub enum PadError {
    /// The backend reported a failure for a specific call.
    #[error("pad backend error: {0}")]
    Backend(String),
    /// The backend is (temporarily) unable to create or drive a pad.
    #[error("pad backend unavailable")]
    Unavailable,
}

/// One virtual controller instance.
///
/// Calls are made synchronously from the receive thread; an error is
/// surfaced as a per-session failure and never stops the loop.
pub trait VirtualPad: Send {
    /// Presses the button identified by its protocol bit.
    fn press_button(&mut self, bit: u16) -> Result<(), PadError>;

    /// Releases the button identified by its protocol bit.
    fn release_button(&mut self, bit: u16) -> Result<(), PadError>;

    /// Sets both stick positions.  Absolute values, not deltas.
    fn set_sticks(&mut self, lx: i16, ly: i16, rx: i16, ry: i16) -> Result<(), PadError>;

    /// Sets both trigger magnitudes.  Absolute values, not deltas.
    fn set_triggers(&mut self, lt: u8, rt: u8) -> Result<(), PadError>;

    /// Commits the pending frame to the OS.
    fn commit(&mut self) -> Result<(), PadError>;

    /// Returns the controller to neutral (all released, sticks centred).
    /// Called before a pad is released so stale input never lingers.
    fn reset(&mut self) -> Result<(), PadError>;
}

/// Factory for virtual pads, one per active session.
///
/// `create` may fail transiently (driver not loaded yet, device limit hit);
/// the orchestrator retries a bounded number of times before degrading the
/// session.  Destruction is `Drop`.
pub trait PadBackend: Send + Sync {
    fn create(&self) -> Result<Box<dyn VirtualPad>, PadError>;
}

/// Applies one decoded state to a pad.
///
/// Button transitions are diffed against `last_buttons`: press/release calls
/// are emitted only for bits that changed, so a held button is never
/// re-pressed.  Sticks and triggers are absolute and set unconditionally,
/// then the frame is committed.
///
/// # Errors
///
/// Propagates the first backend failure.  The caller must not advance its
/// button baseline in that case, so the next frame retries the same diff.
pub fn apply_frame(
    pad: &mut dyn VirtualPad,
    last_buttons: u16,
    state: &PadState,
) -> Result<(), PadError> {
    for bit_index in 0..16 {
        let bit = 1u16 << bit_index;
        let was_held = last_buttons & bit != 0;
        let is_held = state.buttons & bit != 0;
        if is_held && !was_held {
            pad.press_button(bit)?;
        } else if !is_held && was_held {
            pad.release_button(bit)?;
        }
    }

    pad.set_sticks(state.left_x, state.left_y, state.right_x, state.right_y)?;
    pad.set_triggers(state.left_trigger, state.right_trigger)?;
    pad.commit()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
