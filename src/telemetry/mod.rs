//! # Telemetry Module
//!
//! Records every frame the monitor accepts as one JSON object per line, and
//! optionally its raw samples as WAV audio.
//!
//! This module handles:
//! - Summarizing decoded frames per channel
//! - Writing JSONL records to rotating log files
//! - Recording samples to rotating 16-bit PCM WAV files
//! - Retaining only the newest N files of each kind

mod files;
pub mod logger;
pub mod recorder;
pub mod types;

pub use logger::TelemetryLogger;
pub use recorder::SampleRecorder;
pub use types::FrameRecord;
