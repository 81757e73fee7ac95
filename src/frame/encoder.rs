//! # Batch Frame Encoder
//!
//! Encodes a complete batch in one pass. The device builds frames
//! incrementally in the [`BatchBuffer`](super::batch::BatchBuffer); this
//! encoder produces the same bytes from a finished set of rows and serves as
//! the reference for tests and for tools that replay recorded data.

use super::crc::{crc16, crc16_update};
use super::layout::*;
use crate::error::{DaqError, Result};

/// Encode sample rows into a complete batch frame
///
/// # Arguments
///
/// * `layout` - Frame shape
/// * `sequence` - Sequence counter
/// * `samples` - `channels × samples_per_batch` values, row-major
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Frame bytes (sync + counter + payload + CRC)
///
/// # Errors
///
/// Returns error if `samples` does not hold exactly one full batch.
///
/// # Examples
///
/// ```
/// use daq_stream::frame::encoder::encode_frame;
/// use daq_stream::frame::layout::FrameLayout;
///
/// let layout = FrameLayout::default();
/// let samples = vec![0i16; 5 * 80];
/// let frame = encode_frame(&layout, 0, &samples)?;
/// assert_eq!(frame.len(), 805);
/// # Ok::<(), daq_stream::error::DaqError>(())
/// ```
pub fn encode_frame(layout: &FrameLayout, sequence: u8, samples: &[i16]) -> Result<Vec<u8>> {
    let expected = layout.channels() * layout.samples_per_batch();
    if samples.len() != expected {
        return Err(DaqError::Frame(format!(
            "expected {} samples for one batch, got {}",
            expected,
            samples.len()
        )));
    }

    let mut frame = Vec::with_capacity(layout.frame_len());
    frame.extend_from_slice(&SYNC_BYTES);
    frame.push(sequence);
    for sample in samples {
        frame.extend_from_slice(&sample.to_le_bytes());
    }

    let checksum = trailer_checksum(&frame);
    frame.extend_from_slice(&checksum.to_le_bytes());

    Ok(frame)
}

/// Trailer value for a frame body (everything before the trailer)
///
/// The trailer bytes are folded into the checksum as zeros, so this equals
/// the CRC of the whole frame with its trailer zeroed.
pub fn trailer_checksum(body: &[u8]) -> u16 {
    crc16_update(crc16(body), &[0u8; TRAILER_SIZE])
}
