//! Codeden Bridge library target.
//!
//! Exposes the protocol and request loop for integration tests. The binary
//! entry point is in `main.rs`.

pub mod protocol;
pub mod server;

pub use server::{handle, serve};
