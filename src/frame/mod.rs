//! # Batch Frame Module
//!
//! The fixed-size, checksummed unit streamed over the serial link.
//!
//! This module handles:
//! - CRC-16 checksum calculation, incremental per sample row
//! - Frame layout constants and offsets
//! - The two-slot ping-pong batch buffer the acquisition handler fills
//! - Reference encoding and receiver-side decoding / resynchronisation

pub mod layout;
pub mod crc;
pub mod batch;
pub mod encoder;
pub mod decoder;
