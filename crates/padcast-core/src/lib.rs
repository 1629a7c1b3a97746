//! # padcast-core
//!
//! Shared library for PadCast containing the wire protocol codec, sequence
//! arithmetic, and the common timestamp helper.
//!
//! This crate is used by both the host and sender applications.
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.
//!
//! # Architecture overview
//!
//! PadCast relays gamepad input over a LAN: a "sender" samples a physical
//! controller (or any other frame source) and streams its state as UDP
//! datagrams; a "host" validates those datagrams and drives a virtual
//! controller that local software sees as real hardware.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Every datagram is
//!   one fixed-size binary record (`PadState`) encoded little-endian, and the
//!   decoder rejects anything malformed before the host ever looks at it.
//!
//! - **`time`** – The epoch-nanosecond timestamp both ends stamp and compare
//!   for replay-window validation and latency estimation.

pub mod protocol;
pub mod time;

// Re-export the most-used items at the crate root so callers can write
// `padcast_core::PadState` instead of `padcast_core::protocol::state::PadState`.
pub use protocol::codec::{decode, encode, WireError};
pub use protocol::sequence::SequenceCounter;
pub use protocol::state::{PadState, MAX_PACKET_SIZE, PACKET_SIZE, PROTOCOL_VERSION};
