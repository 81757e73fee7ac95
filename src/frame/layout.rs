//! # Batch Frame Layout
//!
//! Wire constants and offset arithmetic for batch frames.
//!
//! ```text
//! offset  size              field
//! 0       2                 sync marker 0xAA 0xBB
//! 2       1                 sequence counter (mod 256)
//! 3       2·C·S             samples, i16 little-endian, row-major (sample, then channel)
//! 3+2·C·S 2                 CRC-16 little-endian over every preceding byte
//! ```

/// Frame sync marker
pub const SYNC_BYTES: [u8; 2] = [0xAA, 0xBB];

/// Sync marker plus sequence counter
pub const HEADER_SIZE: usize = 3;

/// Offset of the sequence counter
pub const SEQUENCE_OFFSET: usize = 2;

/// Trailing checksum size
pub const TRAILER_SIZE: usize = 2;

/// Bytes per sample on the wire
pub const SAMPLE_SIZE: usize = 2;

/// Default number of ADC channels sampled per conversion
pub const DEFAULT_CHANNELS: usize = 5;

/// Default number of sample rows per batch
pub const DEFAULT_SAMPLES_PER_BATCH: usize = 80;

/// Frame length for the default layout (3 + 800 + 2)
pub const BATCH_FRAME_SIZE: usize =
    HEADER_SIZE + SAMPLE_SIZE * DEFAULT_CHANNELS * DEFAULT_SAMPLES_PER_BATCH + TRAILER_SIZE;

/// Upper bound on channels (AD7606-class converters expose 8)
pub const MAX_CHANNELS: usize = 8;

/// Largest batch accepted from configuration (64 KiB slots at 8 channels)
pub const MAX_SAMPLES_PER_BATCH: usize = 4096;

/// Shape of a batch frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    channels: usize,
    samples_per_batch: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            samples_per_batch: DEFAULT_SAMPLES_PER_BATCH,
        }
    }
}

impl FrameLayout {
    /// Create a layout
    ///
    /// # Panics
    ///
    /// Panics if `channels` is outside `1..=MAX_CHANNELS` or
    /// `samples_per_batch` is zero. Configuration validation rejects both
    /// before a layout is ever built from user input.
    pub fn new(channels: usize, samples_per_batch: usize) -> Self {
        assert!(
            (1..=MAX_CHANNELS).contains(&channels),
            "channels must be 1..={}",
            MAX_CHANNELS
        );
        assert!(samples_per_batch > 0, "samples_per_batch must be non-zero");

        Self {
            channels,
            samples_per_batch,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples_per_batch(&self) -> usize {
        self.samples_per_batch
    }

    /// Bytes occupied by one sample row
    pub fn row_len(&self) -> usize {
        self.channels * SAMPLE_SIZE
    }

    /// Payload size (`2 × channels × samples_per_batch`)
    pub fn payload_len(&self) -> usize {
        self.row_len() * self.samples_per_batch
    }

    /// Absolute frame offset of sample row `row`
    pub fn row_offset(&self, row: usize) -> usize {
        debug_assert!(row < self.samples_per_batch);
        HEADER_SIZE + row * self.row_len()
    }

    /// Absolute frame offset of the checksum trailer
    pub fn trailer_offset(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }

    /// Total frame length on the wire
    pub fn frame_len(&self) -> usize {
        self.trailer_offset() + TRAILER_SIZE
    }
}
