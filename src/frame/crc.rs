//! # CRC-16 Implementation
//!
//! CRC-16 checksum over batch frames.
//!
//! **Polynomial**: 0xA001 (0x8005 reflected, processed low bit first)
//! **Initial Value**: 0xFFFF
//! **Final XOR**: none
//!
//! The acquisition handler folds each sample row into the checksum as soon as
//! it lands in the frame, so the checksum is kept in a [`Crc16Accumulator`]
//! that remembers how far into the frame it has already advanced.

/// Reflected CRC-16 polynomial
pub const CRC16_POLY: u16 = 0xA001;

/// Checksum value at the start of every frame
pub const CRC16_INIT: u16 = 0xFFFF;

/// Precomputed CRC16 lookup table for fast calculation
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Extend a CRC-16 value over `data` using the lookup table
///
/// # Arguments
///
/// * `crc` - Checksum so far ([`CRC16_INIT`] for a fresh frame)
/// * `data` - Bytes that directly follow the bytes already folded into `crc`
///
/// # Returns
///
/// * `u16` - Updated checksum
///
/// # Examples
///
/// ```
/// use daq_stream::frame::crc::{crc16_update, CRC16_INIT};
///
/// let whole = crc16_update(CRC16_INIT, b"123456789");
/// let split = crc16_update(crc16_update(CRC16_INIT, b"1234"), b"56789");
/// assert_eq!(whole, split);
/// ```
pub fn crc16_update(crc: u16, data: &[u8]) -> u16 {
    let mut crc = crc;

    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }

    crc
}

/// Checksum of a complete byte range starting from [`CRC16_INIT`]
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(CRC16_INIT, data)
}

/// Bit-serial CRC-16 (slow, for verification)
///
/// Processes every byte low bit first, exactly as the algorithm is defined.
/// Used by tests to cross-check the lookup table.
#[allow(dead_code)]
fn crc16_update_slow(crc: u16, data: &[u8]) -> u16 {
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Running checksum over the frame currently being filled
///
/// Holds the checksum value and the byte offset up to which it has been
/// folded. It can only move forward: [`fold_to`](Self::fold_to) always starts
/// at the stored offset, so ranges are contiguous and ordered by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16Accumulator {
    value: u16,
    offset: usize,
}

impl Default for Crc16Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16Accumulator {
    /// Fresh accumulator at offset 0
    pub const fn new() -> Self {
        Self {
            value: CRC16_INIT,
            offset: 0,
        }
    }

    /// Reset to the initial value at the start of a new frame
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Fold `frame[offset..end]` into the checksum and move the offset to `end`
    ///
    /// # Panics
    ///
    /// Panics if `end` lies before the current offset or past the end of
    /// `frame`. Both are caller bugs, never data-dependent conditions.
    pub fn fold_to(&mut self, frame: &[u8], end: usize) -> u16 {
        assert!(
            end >= self.offset,
            "checksum range must not move backwards ({} < {})",
            end,
            self.offset
        );

        self.value = crc16_update(self.value, &frame[self.offset..end]);
        self.offset = end;
        self.value
    }

    /// Current checksum value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Number of frame bytes already folded in
    pub fn offset(&self) -> usize {
        self.offset
    }
}
