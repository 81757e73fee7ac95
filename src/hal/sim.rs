//! Simulated peripherals for the host-side device model.

use std::collections::VecDeque;
use std::f64::consts::TAU;

use bytes::{Bytes, BytesMut};

use super::{AdcDriver, EventLine, SerialTx};

/// Interrupt enable flag with transition counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimLine {
    enabled: bool,
    enables: u64,
    disables: u64,
}

impl SimLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `enable` calls so far
    pub fn enables(&self) -> u64 {
        self.enables
    }

    /// Number of `disable` calls so far
    pub fn disables(&self) -> u64 {
        self.disables
    }
}

impl EventLine for SimLine {
    fn enable(&mut self) {
        self.enabled = true;
        self.enables += 1;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.disables += 1;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Transmit register that collects everything written to it
#[derive(Debug, Default)]
pub struct ByteSink {
    bytes: BytesMut,
    total: u64,
}

impl ByteSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all bytes collected since the last call
    pub fn take(&mut self) -> Bytes {
        self.bytes.split().freeze()
    }

    /// Bytes waiting to be taken
    pub fn pending(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes written since creation
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl SerialTx for ByteSink {
    fn send_byte(&mut self, byte: u8) {
        self.bytes.extend_from_slice(&[byte]);
        self.total += 1;
    }
}

/// Multi-tone signal source standing in for the converter
///
/// Channel `c` carries `amplitude × full scale × sin(2π f_c t)` plus optional
/// pseudo-random noise. Time advances one sample period per conversion, so
/// output is fully deterministic.
#[derive(Debug, Clone)]
pub struct SyntheticAdc {
    frequencies_hz: Vec<f64>,
    amplitude: f64,
    noise: f64,
    sample_period_s: f64,
    sample_index: u64,
    latched_index: u64,
    converting: bool,
    noise_state: u32,
}

impl SyntheticAdc {
    /// # Arguments
    ///
    /// * `channels` - Number of channels produced per row
    /// * `sample_rate_hz` - Conversion rate, used to advance signal time
    /// * `amplitude` - Peak level as a fraction of full scale (0.0-1.0)
    /// * `frequencies_hz` - Tone per channel, cycled if shorter than `channels`
    /// * `noise` - Noise level as a fraction of full scale (0.0-1.0)
    pub fn new(
        channels: usize,
        sample_rate_hz: u32,
        amplitude: f64,
        frequencies_hz: &[f64],
        noise: f64,
    ) -> Self {
        let frequencies_hz = if frequencies_hz.is_empty() {
            vec![0.0; channels]
        } else {
            frequencies_hz.iter().copied().cycle().take(channels).collect()
        };

        Self {
            frequencies_hz,
            amplitude: amplitude.clamp(0.0, 1.0),
            noise: noise.clamp(0.0, 1.0),
            sample_period_s: 1.0 / sample_rate_hz.max(1) as f64,
            sample_index: 0,
            latched_index: 0,
            converting: false,
            noise_state: 0x2545_F491,
        }
    }

    /// Whether a started conversion has not been read yet
    pub fn is_busy(&self) -> bool {
        self.converting
    }

    /// Conversions started so far
    pub fn conversions(&self) -> u64 {
        self.sample_index
    }

    fn next_noise(&mut self) -> f64 {
        // xorshift32
        let mut x = self.noise_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise_state = x;
        (x as f64 / u32::MAX as f64) * 2.0 - 1.0
    }
}

impl AdcDriver for SyntheticAdc {
    fn start_conversion(&mut self) {
        self.latched_index = self.sample_index;
        self.sample_index += 1;
        self.converting = true;
    }

    fn read_row(&mut self, row: &mut [i16]) {
        let t = self.latched_index as f64 * self.sample_period_s;
        let full_scale = i16::MAX as f64;

        for (channel, value) in row.iter_mut().enumerate() {
            let frequency = self.frequencies_hz.get(channel).copied().unwrap_or(0.0);
            let mut level = self.amplitude * (TAU * frequency * t).sin();
            if self.noise > 0.0 {
                level += self.noise * self.next_noise();
            }
            *value = (level.clamp(-1.0, 1.0) * full_scale).round() as i16;
        }

        self.converting = false;
    }
}

/// Converter that replays a fixed list of rows, cycling when exhausted
#[derive(Debug, Clone)]
pub struct ScriptedAdc {
    rows: VecDeque<Vec<i16>>,
    started: u64,
    read: u64,
}

impl ScriptedAdc {
    pub fn new(rows: Vec<Vec<i16>>) -> Self {
        Self {
            rows: rows.into(),
            started: 0,
            read: 0,
        }
    }

    pub fn started(&self) -> u64 {
        self.started
    }

    pub fn read(&self) -> u64 {
        self.read
    }
}

impl AdcDriver for ScriptedAdc {
    fn start_conversion(&mut self) {
        self.started += 1;
    }

    fn read_row(&mut self, row: &mut [i16]) {
        match self.rows.pop_front() {
            Some(next) => {
                for (dst, src) in row.iter_mut().zip(next.iter()) {
                    *dst = *src;
                }
                self.rows.push_back(next);
            }
            None => row.fill(0),
        }
        self.read += 1;
    }
}
