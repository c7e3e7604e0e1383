//! Packet-level protocols built on top of the shared [`crate::wire::frame`] codec.

pub mod coordinator;
pub mod game;
