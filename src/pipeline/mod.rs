//! # Acquisition Pipeline
//!
//! The three event handlers that make up the device's steady state:
//!
//! - [`scheduler::SampleScheduler`] on the sampling timer tick
//! - [`acquisition::AcquisitionHandler`] on conversion-ready
//! - [`transmitter::Transmitter`] on link-ready (byte sent)
//!
//! Each piece of mutable state has exactly one writer. Handlers receive the
//! peripherals and the batch buffer as arguments; whoever dispatches events
//! decides who gets `&mut` and who gets `&`.

pub mod guard;
pub mod scheduler;
pub mod acquisition;
pub mod transmitter;
pub mod timing;
