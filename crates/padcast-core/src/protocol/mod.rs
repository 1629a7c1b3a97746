//! Wire protocol for PadCast datagrams: the state record, the binary codec,
//! and modular sequence-number arithmetic.

pub mod codec;
pub mod sequence;
pub mod state;
