//! Command-line interface for running and inspecting the relay

pub mod server;

pub use server::*;
