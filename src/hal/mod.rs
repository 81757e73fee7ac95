//! # Hardware Collaborator Interfaces
//!
//! Contracts between the acquisition pipeline and the peripherals it drives.
//! Pin setup, clock dividers and converter-specific read quirks live behind
//! these traits; the pipeline only sees ordered samples, bytes and event
//! sources it can mask.
//!
//! The [`sim`] submodule provides host implementations used by the device
//! model and tests.

pub mod sim;

/// Multi-channel ADC with a separate "conversion ready" event
#[cfg_attr(test, mockall::automock)]
pub trait AdcDriver {
    /// Begin a simultaneous conversion of every channel
    fn start_conversion(&mut self);

    /// Read the last converted row, one value per channel
    ///
    /// `row.len()` equals the channel count. Values are already in host byte
    /// order; any wiring-specific bit shuffling is the driver's concern.
    fn read_row(&mut self, row: &mut [i16]);
}

/// Byte-at-a-time serial transmitter
#[cfg_attr(test, mockall::automock)]
pub trait SerialTx {
    /// Load one byte into the transmit register
    fn send_byte(&mut self, byte: u8);
}

/// A maskable hardware event source (interrupt enable bit)
#[cfg_attr(test, mockall::automock)]
pub trait EventLine {
    fn enable(&mut self);
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;
}
