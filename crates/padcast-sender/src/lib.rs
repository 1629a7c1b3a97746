//! padcast-sender library entry point.
//!
//! The sender samples a [`source::FrameSource`] at a fixed rate, packs each
//! frame into the wire format, and streams it at the host over UDP.  Input
//! capture itself (reading a physical controller) is an external
//! collaborator behind the `FrameSource` trait; without one attached the
//! sender emits neutral heartbeat frames so the host still sees a live,
//! owned session.

pub mod service;
pub mod source;
