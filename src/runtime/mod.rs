//! # Runtime Loops
//!
//! Async loops behind the two subcommands:
//!
//! - [`streamer::Streamer`] runs the device model against the wall clock and
//!   writes its link output to a serial port
//! - [`monitor::Monitor`] reads a serial port, decodes frames and records
//!   telemetry
//!
//! Both take the port as a [`SerialPortIO`](crate::serial::port_trait::SerialPortIO)
//! and stop when the shutdown future completes.

pub mod monitor;
pub mod streamer;

pub use monitor::Monitor;
pub use streamer::Streamer;
