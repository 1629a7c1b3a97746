//! Application layer: admission control, session/slot routing, and the
//! virtual-pad seam.  Everything here is driven synchronously from the
//! receive thread and is fully testable without sockets.

pub mod admission;
pub mod pads;
pub mod registry;
pub mod router;
pub mod session;
