//! # Batch Frame Decoder
//!
//! Receiver side of the link: validates and unpacks batch frames, and
//! recovers frame alignment on a raw byte stream.
//!
//! The device never reports framing or timing faults, so every integrity
//! check happens here: sync marker, checksum, and sequence gaps.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use super::encoder::trailer_checksum;
use super::layout::*;
use crate::error::{DaqError, Result};

/// A validated batch frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFrame {
    /// Sequence counter (mod 256)
    pub sequence: u8,
    /// Trailer checksum
    pub checksum: u16,
    channels: usize,
    samples: Vec<i16>,
}

impl BatchFrame {
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of sample rows
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples, row-major
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Sample row `index` (one value per channel)
    pub fn row(&self, index: usize) -> &[i16] {
        let start = index * self.channels;
        &self.samples[start..start + self.channels]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i16]> {
        self.samples.chunks_exact(self.channels)
    }

    /// Time series of a single channel
    pub fn channel(&self, channel: usize) -> Vec<i16> {
        self.rows().map(|row| row[channel]).collect()
    }
}

/// Decode one complete batch frame
///
/// # Errors
///
/// Returns error if:
/// - Frame length does not match the layout
/// - Sync marker is incorrect
/// - Checksum check fails
pub fn decode_frame(layout: &FrameLayout, frame: &[u8]) -> Result<BatchFrame> {
    if frame.len() != layout.frame_len() {
        return Err(DaqError::Frame(format!(
            "Frame length mismatch: expected {} bytes, got {}",
            layout.frame_len(),
            frame.len()
        )));
    }

    if frame[..SYNC_BYTES.len()] != SYNC_BYTES {
        return Err(DaqError::Frame(format!(
            "Invalid sync marker: 0x{:02X} 0x{:02X}",
            frame[0], frame[1]
        )));
    }

    let trailer = layout.trailer_offset();
    let received = u16::from_le_bytes([frame[trailer], frame[trailer + 1]]);
    let calculated = trailer_checksum(&frame[..trailer]);

    if calculated != received {
        return Err(DaqError::Frame(format!(
            "CRC mismatch: expected 0x{:04X}, got 0x{:04X}",
            calculated, received
        )));
    }

    let samples = frame[HEADER_SIZE..trailer]
        .chunks_exact(SAMPLE_SIZE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(BatchFrame {
        sequence: frame[SEQUENCE_OFFSET],
        checksum: received,
        channels: layout.channels(),
        samples,
    })
}

/// Frames missing between two received sequence counters
///
/// The counter is a single byte, so gaps are computed modulo 256.
pub fn lost_frames(previous: u8, current: u8) -> u8 {
    current.wrapping_sub(previous).wrapping_sub(1)
}

/// A frame pulled out of the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame: BatchFrame,
    /// Frames skipped since the previous accepted frame
    pub lost_frames: u8,
}

/// Running totals of a [`StreamDecoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Frames accepted
    pub frames: u64,
    /// Frames inferred missing from sequence gaps
    pub lost_frames: u64,
    /// Repeated neighbouring frames dropped
    pub duplicates: u64,
    /// Bytes discarded while searching for alignment
    pub skipped_bytes: u64,
}

/// Frame resynchronising decoder over a continuous byte stream
///
/// Bytes are appended with [`push`](Self::push); complete frames are pulled
/// with [`next_frame`](Self::next_frame). When the data at the head of the
/// buffer is not a valid frame, one byte is dropped and the search continues
/// at the next sync marker.
#[derive(Debug)]
pub struct StreamDecoder {
    layout: FrameLayout,
    buffer: BytesMut,
    prev_sequence: Option<u8>,
    prev_checksum: Option<u16>,
    stats: StreamStats,
}

impl StreamDecoder {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            buffer: BytesMut::with_capacity(layout.frame_len() * 2),
            prev_sequence: None,
            prev_checksum: None,
            stats: StreamStats::default(),
        }
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes waiting to be decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Pull the next valid frame, if a complete one is buffered
    pub fn next_frame(&mut self) -> Option<ReceivedFrame> {
        let frame_len = self.layout.frame_len();

        loop {
            self.align_to_sync();
            if self.buffer.len() < frame_len {
                return None;
            }

            match decode_frame(&self.layout, &self.buffer[..frame_len]) {
                Ok(frame) => {
                    self.buffer.advance(frame_len);

                    // The relay occasionally repeats a frame verbatim
                    if self.prev_checksum == Some(frame.checksum) {
                        trace!("Dropping duplicate frame (seq {})", frame.sequence);
                        self.stats.duplicates += 1;
                        continue;
                    }

                    let lost = match self.prev_sequence {
                        Some(previous) => lost_frames(previous, frame.sequence),
                        None => 0,
                    };
                    if lost > 0 {
                        debug!("Sequence gap before frame {}: {} lost", frame.sequence, lost);
                    }

                    self.prev_sequence = Some(frame.sequence);
                    self.prev_checksum = Some(frame.checksum);
                    self.stats.frames += 1;
                    self.stats.lost_frames += lost as u64;

                    return Some(ReceivedFrame {
                        frame,
                        lost_frames: lost,
                    });
                }
                Err(e) => {
                    trace!("Rejecting candidate frame: {}", e);
                    self.buffer.advance(1);
                    self.stats.skipped_bytes += 1;
                }
            }
        }
    }

    /// Drop bytes until the buffer starts with the sync marker
    ///
    /// A trailing lone first sync byte is kept since its partner may arrive
    /// with the next push.
    fn align_to_sync(&mut self) {
        let position = self
            .buffer
            .windows(SYNC_BYTES.len())
            .position(|window| window == SYNC_BYTES);

        let skip = match position {
            Some(position) => position,
            None if self.buffer.last() == Some(&SYNC_BYTES[0]) => self.buffer.len() - 1,
            None => self.buffer.len(),
        };

        if skip > 0 {
            self.buffer.advance(skip);
            self.stats.skipped_bytes += skip as u64;
        }
    }
}
