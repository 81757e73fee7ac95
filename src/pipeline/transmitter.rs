//! # Transmitter
//!
//! Drains one handed-off slot onto the serial link, one byte per link-ready
//! event, then masks its own event source until the next hand-off.
//!
//! The transmit cursor is owned exclusively by the transmitter. The buffer is
//! only ever read.

use tracing::{trace, warn};

use super::acquisition::HandoffSink;
use crate::frame::batch::{BatchBuffer, Handoff, Slot};
use crate::hal::{EventLine, SerialTx};

/// Position within the slot being drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxCursor {
    pub slot: Slot,
    /// Next byte to send
    pub offset: usize,
    /// Bytes in the drained range
    pub len: usize,
}

impl TxCursor {
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.offset)
    }
}

/// Byte-level frame drainer
#[derive(Debug, Clone, Default)]
pub struct Transmitter {
    cursor: Option<TxCursor>,
    bytes_sent: u64,
    frames_sent: u64,
    preempted_drains: u64,
}

impl Transmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active cursor, `None` when idle
    pub fn cursor(&self) -> Option<TxCursor> {
        self.cursor
    }

    pub fn is_idle(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Frames drained to the end
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Hand-offs that replaced a drain still in progress
    pub fn preempted_drains(&self) -> u64 {
        self.preempted_drains
    }

    /// Start draining a freshly finalized frame
    ///
    /// Sends the first byte immediately and enables link-ready events. A
    /// drain still in progress is abandoned; the new cursor replaces it.
    pub fn begin<S, L>(&mut self, handoff: Handoff, buffer: &BatchBuffer, serial: &mut S, link: &mut L)
    where
        S: SerialTx + ?Sized,
        L: EventLine + ?Sized,
    {
        assert!(handoff.len > 0, "cannot drain an empty range");

        if let Some(previous) = self.cursor {
            self.preempted_drains += 1;
            warn!(
                "Hand-off of frame {} while slot {} still had {} bytes to send",
                handoff.sequence,
                previous.slot.index(),
                previous.remaining()
            );
        }

        serial.send_byte(buffer.slot_bytes(handoff.slot)[0]);
        self.bytes_sent += 1;
        self.cursor = Some(TxCursor {
            slot: handoff.slot,
            offset: 1,
            len: handoff.len,
        });

        link.enable();
    }

    /// Link-ready event: send the next byte, or go idle when done
    ///
    /// Returns `true` if a byte was sent.
    pub fn on_byte_sent<S, L>(&mut self, buffer: &BatchBuffer, serial: &mut S, link: &mut L) -> bool
    where
        S: SerialTx + ?Sized,
        L: EventLine + ?Sized,
    {
        let Some(cursor) = self.cursor.as_mut() else {
            link.disable();
            return false;
        };

        if cursor.offset >= cursor.len {
            link.disable();
            self.cursor = None;
            self.frames_sent += 1;
            trace!("Drain complete, transmitter idle");
            return false;
        }

        serial.send_byte(buffer.slot_bytes(cursor.slot)[cursor.offset]);
        cursor.offset += 1;
        self.bytes_sent += 1;
        true
    }
}

/// Hand-off target that starts a drain on the transmitter
///
/// Borrows the transmitter together with the link peripherals for the
/// duration of one acquisition event.
pub struct LinkHandoff<'a, S: SerialTx + ?Sized, L: EventLine + ?Sized> {
    pub transmitter: &'a mut Transmitter,
    pub serial: &'a mut S,
    pub link: &'a mut L,
}

impl<S: SerialTx + ?Sized, L: EventLine + ?Sized> HandoffSink for LinkHandoff<'_, S, L> {
    fn hand_off(&mut self, handoff: Handoff, buffer: &BatchBuffer) {
        self.transmitter
            .begin(handoff, buffer, &mut *self.serial, &mut *self.link);
    }
}
