//! # Acquisition Handler
//!
//! Runs once per conversion-ready event. Reads one sample row, stores it in
//! the filling slot, extends the running checksum and, on the last row of a
//! batch, finalizes the frame and hands it to the transmitter.
//!
//! The handler exclusively owns the sample index and the sequence counter,
//! and is the only holder of `&mut BatchBuffer`. It masks its own trigger
//! for the whole body, so it never runs re-entrantly.
//!
//! It never checks transmitter progress. If the link has not drained a slot
//! by the time that slot is filled again, the in-flight frame is silently
//! overwritten.

use tracing::debug;

use super::guard::MaskGuard;
use crate::frame::batch::{BatchBuffer, Handoff};
use crate::frame::layout::FrameLayout;
use crate::hal::{AdcDriver, EventLine};

/// Receiver of finalized frames
///
/// Single-producer single-consumer hand-off from the acquisition handler to
/// the transmitter. The buffer is passed read-only so the consumer can start
/// draining straight away.
pub trait HandoffSink {
    fn hand_off(&mut self, handoff: Handoff, buffer: &BatchBuffer);
}

impl HandoffSink for Vec<Handoff> {
    fn hand_off(&mut self, handoff: Handoff, _buffer: &BatchBuffer) {
        self.push(handoff);
    }
}

/// Acquisition cursor and per-row scratch space
#[derive(Debug, Clone)]
pub struct AcquisitionHandler {
    layout: FrameLayout,
    sample_index: usize,
    sequence: u8,
    row: Vec<i16>,
    batches: u64,
}

impl AcquisitionHandler {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            sample_index: 0,
            sequence: 0,
            row: vec![0; layout.channels()],
            batches: 0,
        }
    }

    /// Row index the next conversion will be written to
    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    /// Sequence counter of the frame being filled
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Batches completed so far
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Conversion-ready event
    ///
    /// Returns the hand-off made on batch completion, if any.
    pub fn on_conversion_ready<A, L, H>(
        &mut self,
        buffer: &mut BatchBuffer,
        adc: &mut A,
        ready_line: &mut L,
        sink: &mut H,
    ) -> Option<Handoff>
    where
        A: AdcDriver + ?Sized,
        L: EventLine + ?Sized,
        H: HandoffSink + ?Sized,
    {
        let _mask = MaskGuard::new(ready_line);

        let slot = buffer.filling();
        if self.sample_index == 0 {
            buffer.begin_frame(slot, self.sequence);
        }

        adc.read_row(&mut self.row);
        buffer.write_row(slot, self.sample_index, &self.row);

        self.sample_index = (self.sample_index + 1) % self.layout.samples_per_batch();
        if self.sample_index != 0 {
            return None;
        }

        let handoff = buffer.finalize_frame(slot);
        sink.hand_off(handoff, buffer);
        buffer.swap_roles();

        self.sequence = self.sequence.wrapping_add(1);
        self.batches += 1;

        debug!(
            "Batch {} complete (seq {}, slot {})",
            self.batches,
            handoff.sequence,
            handoff.slot.index()
        );

        Some(handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::batch::Slot;
    use crate::frame::crc::{crc16, crc16_update};
    use crate::frame::decoder::decode_frame;
    use crate::hal::sim::SimLine;
    use crate::hal::{MockAdcDriver, MockEventLine};
    use mockall::Sequence;

    /// Deterministic row for sample `index`
    fn test_row(index: usize, channels: usize) -> Vec<i16> {
        (0..channels)
            .map(|ch| ((index * 131 + ch * 17) as i16).wrapping_mul(if ch % 2 == 0 { 1 } else { -1 }))
            .collect()
    }

    fn scripted_adc(channels: usize) -> MockAdcDriver {
        let mut adc = MockAdcDriver::new();
        let mut index = 0usize;
        adc.expect_read_row().returning(move |row| {
            row.copy_from_slice(&test_row(index, channels));
            index += 1;
        });
        adc
    }

    fn enabled_line() -> SimLine {
        let mut line = SimLine::new();
        line.enable();
        line
    }

    #[test]
    fn test_full_batch_round_trips_through_decoder() {
        let layout = FrameLayout::default();
        let mut buffer = BatchBuffer::new(layout);
        let mut handler = AcquisitionHandler::new(layout);
        let mut adc = scripted_adc(layout.channels());
        let mut line = enabled_line();
        let mut sink: Vec<Handoff> = Vec::new();

        for i in 0..layout.samples_per_batch() {
            let result = handler.on_conversion_ready(&mut buffer, &mut adc, &mut line, &mut sink);
            if i + 1 < layout.samples_per_batch() {
                assert!(result.is_none());
            } else {
                assert!(result.is_some());
            }
        }

        assert_eq!(sink.len(), 1);
        let handoff = sink[0];
        assert_eq!(handoff.slot, Slot::Ping);
        assert_eq!(handoff.len, 805);
        assert_eq!(handoff.sequence, 0);

        let bytes = buffer.slot_bytes(handoff.slot);
        let frame = decode_frame(&layout, bytes).unwrap();
        for (index, row) in frame.rows().enumerate() {
            assert_eq!(row, &test_row(index, layout.channels())[..]);
        }

        // Independent CRC (poly 0xA001, init 0xFFFF) over the frame minus
        // trailer, followed by the zero-filled trailer bytes
        let trailer = u16::from_le_bytes([bytes[803], bytes[804]]);
        assert_eq!(trailer, crc16_update(crc16(&bytes[..803]), &[0, 0]));
    }

    #[test]
    fn test_row_offsets_in_payload() {
        let layout = FrameLayout::new(3, 4);
        let mut buffer = BatchBuffer::new(layout);
        let mut handler = AcquisitionHandler::new(layout);
        let mut adc = scripted_adc(3);
        let mut line = enabled_line();
        let mut sink: Vec<Handoff> = Vec::new();

        for _ in 0..4 {
            handler.on_conversion_ready(&mut buffer, &mut adc, &mut line, &mut sink);
        }

        let bytes = buffer.slot_bytes(Slot::Ping);
        let payload = &bytes[3..3 + layout.payload_len()];
        for i in 0..4 {
            let expected: Vec<u8> = test_row(i, 3).iter().flat_map(|v| v.to_le_bytes()).collect();
            assert_eq!(&payload[i * 3 * 2..i * 3 * 2 + 3 * 2], &expected[..]);
        }
    }

    #[test]
    fn test_sequence_and_slots_alternate() {
        let layout = FrameLayout::new(2, 3);
        let mut buffer = BatchBuffer::new(layout);
        let mut handler = AcquisitionHandler::new(layout);
        let mut adc = scripted_adc(2);
        let mut line = enabled_line();
        let mut sink: Vec<Handoff> = Vec::new();

        for _ in 0..(3 * 300) {
            handler.on_conversion_ready(&mut buffer, &mut adc, &mut line, &mut sink);
        }

        assert_eq!(sink.len(), 300);
        assert_eq!(handler.batches(), 300);
        for pair in sink.windows(2) {
            assert_ne!(pair[0].slot, pair[1].slot);
            assert_eq!(pair[1].sequence, pair[0].sequence.wrapping_add(1));
        }
        assert_eq!(sink[255].sequence, 255);
        assert_eq!(sink[256].sequence, 0);
    }

    #[test]
    fn test_sample_index_resets_on_completion() {
        let layout = FrameLayout::new(1, 4);
        let mut buffer = BatchBuffer::new(layout);
        let mut handler = AcquisitionHandler::new(layout);
        let mut adc = scripted_adc(1);
        let mut line = enabled_line();
        let mut sink: Vec<Handoff> = Vec::new();

        let mut indices = Vec::new();
        for _ in 0..6 {
            handler.on_conversion_ready(&mut buffer, &mut adc, &mut line, &mut sink);
            indices.push((handler.sample_index(), buffer.filling()));
        }

        assert_eq!(
            indices,
            vec![
                (1, Slot::Ping),
                (2, Slot::Ping),
                (3, Slot::Ping),
                (0, Slot::Pong),
                (1, Slot::Pong),
                (2, Slot::Pong),
            ]
        );
        assert_eq!(handler.sequence(), 1);
    }

    #[test]
    fn test_ready_line_masked_during_body() {
        let layout = FrameLayout::new(1, 2);
        let mut buffer = BatchBuffer::new(layout);
        let mut handler = AcquisitionHandler::new(layout);
        let mut sink: Vec<Handoff> = Vec::new();

        let mut seq = Sequence::new();
        let mut line = MockEventLine::new();
        let mut adc = MockAdcDriver::new();

        line.expect_is_enabled()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        line.expect_disable().times(1).in_sequence(&mut seq).return_const(());
        adc.expect_read_row()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|row| row.fill(42));
        line.expect_enable().times(1).in_sequence(&mut seq).return_const(());

        handler.on_conversion_ready(&mut buffer, &mut adc, &mut line, &mut sink);
    }

    #[test]
    fn test_overwrites_slot_without_checking_drain() {
        // Nothing consumes the hand-offs: the handler keeps cycling slots anyway
        let layout = FrameLayout::new(1, 1);
        let mut buffer = BatchBuffer::new(layout);
        let mut handler = AcquisitionHandler::new(layout);
        let mut adc = scripted_adc(1);
        let mut line = enabled_line();
        let mut sink: Vec<Handoff> = Vec::new();

        for _ in 0..4 {
            handler.on_conversion_ready(&mut buffer, &mut adc, &mut line, &mut sink);
        }

        let slots: Vec<Slot> = sink.iter().map(|h| h.slot).collect();
        assert_eq!(slots, vec![Slot::Ping, Slot::Pong, Slot::Ping, Slot::Pong]);
        assert_eq!(buffer.slot_bytes(Slot::Ping)[2], 2);
    }
}
