//! # DAQ Stream Library
//!
//! Interrupt-driven acquisition of multi-channel converter samples, batched
//! into checksummed frames and drained over a serial link.
//!
//! The device side ([`frame`], [`hal`], [`pipeline`], [`device`]) is a
//! ping-pong buffer shared by three prioritized event handlers. The host side
//! ([`serial`], [`runtime`], [`telemetry`]) streams those frames to a port and
//! decodes them on the receiving end.

pub mod config;
pub mod error;
pub mod frame;
pub mod hal;
pub mod pipeline;
pub mod device;
pub mod serial;
pub mod telemetry;
pub mod runtime;
