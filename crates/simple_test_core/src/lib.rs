//! Shared vocabulary for the fake-compiler control channel.
//!
//! Both sides of the channel (the harness that programs it and the `sc-fake`
//! agent that answers it) read the file names, slot numbering and markers from
//! here, so they cannot drift apart.
//!
//! This crate is intentionally dependency-free.

pub mod protocol;
