//! Core layer for the Banter sync engine.
//!
//! Provides the two pieces everything above depends on:
//!
//! - [`env::Environment`]: abstraction over time and randomness, so the
//!   engine's local-issue timestamps and correlation keys are deterministic
//!   under test.
//! - [`connection::Connection`]: the Sans-IO connection lifecycle state
//!   machine. It owns the transport state exclusively; every other component
//!   sends through it and nothing else writes its lifecycle.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;

pub use connection::{Connection, ConnectionAction, TransportState};
pub use env::Environment;
