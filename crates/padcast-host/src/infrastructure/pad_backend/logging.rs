//! Logging pad backend: applies nothing, records nothing, logs everything.
//!
//! This is the behaviour the host falls back to when no OS driver
//! integration is compiled in, and what the operator sees from a degraded
//! session: the client is visible and its input observable in the logs, but
//! no virtual controller exists.

use tracing::{debug, trace};

use crate::application::pads::{PadBackend, PadError, VirtualPad};

/// A pad that logs each call at trace level and each committed frame at
/// debug level.
pub struct LoggingPad {
    frame: u64,
}

impl VirtualPad for LoggingPad {
    fn press_button(&mut self, bit: u16) -> Result<(), PadError> {
        trace!(bit = format_args!("{bit:#06x}"), "press");
        Ok(())
    }

    fn release_button(&mut self, bit: u16) -> Result<(), PadError> {
        trace!(bit = format_args!("{bit:#06x}"), "release");
        Ok(())
    }

    fn set_sticks(&mut self, lx: i16, ly: i16, rx: i16, ry: i16) -> Result<(), PadError> {
        trace!(lx, ly, rx, ry, "sticks");
        Ok(())
    }

    fn set_triggers(&mut self, lt: u8, rt: u8) -> Result<(), PadError> {
        trace!(lt, rt, "triggers");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PadError> {
        self.frame += 1;
        debug!(frame = self.frame, "frame committed (logging pad)");
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PadError> {
        debug!("pad reset to neutral (logging pad)");
        Ok(())
    }
}

/// Backend that hands out [`LoggingPad`]s.  Never fails.
#[derive(Default)]
pub struct LoggingPadBackend;

impl LoggingPadBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PadBackend for LoggingPadBackend {
    fn create(&self) -> Result<Box<dyn VirtualPad>, PadError> {
        debug!("created logging pad");
        Ok(Box::new(LoggingPad { frame: 0 }))
    }
}
