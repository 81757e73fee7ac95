//! # Ping-Pong Batch Buffer
//!
//! Two frame-sized slots: one is filled row by row while the other is drained
//! onto the link. Storage is allocated once when the buffer is created and
//! then overwritten in place every batch cycle.
//!
//! Only the acquisition handler holds a `&mut BatchBuffer`; the transmitter
//! reads drainable slots through `&BatchBuffer`.

use super::crc::Crc16Accumulator;
use super::layout::{FrameLayout, HEADER_SIZE, SEQUENCE_OFFSET, SYNC_BYTES, TRAILER_SIZE};

/// One of the two storage slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Slot 0
    Ping,
    /// Slot 1
    Pong,
}

impl Slot {
    pub fn index(self) -> usize {
        match self {
            Slot::Ping => 0,
            Slot::Pong => 1,
        }
    }

    /// The opposite slot
    pub fn other(self) -> Slot {
        match self {
            Slot::Ping => Slot::Pong,
            Slot::Pong => Slot::Ping,
        }
    }
}

/// What a slot is currently used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// Never handed off yet
    Idle,
    /// Receiving sample rows
    Filling,
    /// Finalized and handed to the transmitter
    ///
    /// The buffer keeps this role until the slot is filled again, so the
    /// drain may already be finished. `Device::slot_role` consults the
    /// transmitter for the live state.
    Draining,
}

/// A finalized frame handed from the acquisition handler to the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Slot holding the frame
    pub slot: Slot,
    /// Number of bytes to drain
    pub len: usize,
    /// Sequence counter written into the frame
    pub sequence: u8,
}

/// Two-slot frame store with role tracking and the running checksum
pub struct BatchBuffer {
    layout: FrameLayout,
    slots: [Box<[u8]>; 2],
    roles: [SlotRole; 2],
    filling: Slot,
    crc: Crc16Accumulator,
}

impl std::fmt::Debug for BatchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchBuffer")
            .field("layout", &self.layout)
            .field("roles", &self.roles)
            .field("filling", &self.filling)
            .field("crc", &self.crc)
            .finish_non_exhaustive()
    }
}

impl BatchBuffer {
    /// Allocate both slots; slot 0 starts as the filling slot
    pub fn new(layout: FrameLayout) -> Self {
        let frame_len = layout.frame_len();

        Self {
            layout,
            slots: [
                vec![0u8; frame_len].into_boxed_slice(),
                vec![0u8; frame_len].into_boxed_slice(),
            ],
            roles: [SlotRole::Filling, SlotRole::Idle],
            filling: Slot::Ping,
            crc: Crc16Accumulator::new(),
        }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// The slot currently receiving rows
    pub fn filling(&self) -> Slot {
        self.filling
    }

    pub fn role(&self, slot: Slot) -> SlotRole {
        self.roles[slot.index()]
    }

    /// Raw bytes of a slot
    pub fn slot_bytes(&self, slot: Slot) -> &[u8] {
        &self.slots[slot.index()]
    }

    /// Running checksum of the frame being filled
    pub fn checksum(&self) -> &Crc16Accumulator {
        &self.crc
    }

    /// Start a new frame: sync marker and sequence counter, fresh checksum
    ///
    /// The header is folded into the checksum immediately, leaving the
    /// accumulator positioned at the start of the payload.
    pub fn begin_frame(&mut self, slot: Slot, sequence: u8) {
        debug_assert_eq!(slot, self.filling, "only the filling slot can be written");

        let frame = &mut self.slots[slot.index()];
        frame[..SYNC_BYTES.len()].copy_from_slice(&SYNC_BYTES);
        frame[SEQUENCE_OFFSET] = sequence;

        self.crc.reset();
        self.crc.fold_to(frame, HEADER_SIZE);
    }

    /// Write sample row `row` at its fixed payload offset and fold it into
    /// the checksum
    ///
    /// Rows must be written in order `0, 1, 2, ...` after
    /// [`begin_frame`](Self::begin_frame).
    pub fn write_row(&mut self, slot: Slot, row: usize, samples: &[i16]) {
        debug_assert_eq!(slot, self.filling, "only the filling slot can be written");
        assert_eq!(samples.len(), self.layout.channels(), "one sample per channel");

        let start = self.layout.row_offset(row);
        assert_eq!(
            start,
            self.crc.offset(),
            "row {} written out of order",
            row
        );

        let end = start + self.layout.row_len();
        let frame = &mut self.slots[slot.index()];
        for (chunk, sample) in frame[start..end].chunks_exact_mut(2).zip(samples) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }

        self.crc.fold_to(frame, end);
    }

    /// Close the frame: zero the trailer, fold it, store the checksum
    /// (little-endian) and mark the slot drainable
    pub fn finalize_frame(&mut self, slot: Slot) -> Handoff {
        debug_assert_eq!(slot, self.filling, "only the filling slot can be finalized");

        let trailer = self.layout.trailer_offset();
        let frame_len = self.layout.frame_len();
        let frame = &mut self.slots[slot.index()];

        frame[trailer..frame_len].fill(0);
        let checksum = self.crc.fold_to(frame, frame_len);
        frame[trailer..trailer + TRAILER_SIZE].copy_from_slice(&checksum.to_le_bytes());

        self.roles[slot.index()] = SlotRole::Draining;

        Handoff {
            slot,
            len: frame_len,
            sequence: frame[SEQUENCE_OFFSET],
        }
    }

    /// Make the other slot the filling slot
    pub fn swap_roles(&mut self) -> Slot {
        self.filling = self.filling.other();
        self.roles[self.filling.index()] = SlotRole::Filling;
        self.filling
    }
}
