//! # Timing Budget
//!
//! A slot must finish draining before the acquisition handler starts
//! filling it again, one batch period after its hand-off. Nothing checks
//! this at runtime; it holds only if the sampling rate, batch size and link
//! speed leave room for it.
//!
//! | Quantity | Formula |
//! |---|---|
//! | tick period | 1 s / sample rate |
//! | batch period | samples per batch / sample rate |
//! | byte time | bits per byte / baud rate |
//! | drain time | frame length × byte time |

use std::time::Duration;

use crate::frame::layout::FrameLayout;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Sampling versus link timing for one configuration
///
/// Periods are whole nanoseconds. The tick period alone is truncated for
/// rates that do not divide 1 s; the batch period is computed from the rate
/// directly so it carries no accumulated rounding. Products that exceed
/// `u64` saturate, which always reads as a missed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingBudget {
    sample_rate_hz: u64,
    byte_time_ns: u64,
    samples_per_batch: u64,
    frame_len: u64,
}

impl TimingBudget {
    /// # Arguments
    ///
    /// * `layout` - Frame shape
    /// * `sample_rate_hz` - Sampling clock frequency
    /// * `baud_rate` - Link bit rate
    /// * `bits_per_byte` - Bits on the wire per byte including start/stop (10 for 8N1)
    ///
    /// Zero rates are treated as 1 so the budget is always computable; the
    /// configuration layer rejects them separately.
    pub fn new(layout: &FrameLayout, sample_rate_hz: u32, baud_rate: u32, bits_per_byte: u32) -> Self {
        let baud_rate = baud_rate.max(1) as u64;

        Self {
            sample_rate_hz: sample_rate_hz.max(1) as u64,
            byte_time_ns: (bits_per_byte as u64 * NANOS_PER_SEC).div_ceil(baud_rate),
            samples_per_batch: layout.samples_per_batch() as u64,
            frame_len: layout.frame_len() as u64,
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz as u32
    }

    /// One sampling period, truncated to whole nanoseconds
    pub fn tick_period_ns(&self) -> u64 {
        NANOS_PER_SEC / self.sample_rate_hz
    }

    pub fn byte_time_ns(&self) -> u64 {
        self.byte_time_ns
    }

    pub fn batch_period_ns(&self) -> u64 {
        let ns = self.samples_per_batch as u128 * NANOS_PER_SEC as u128 / self.sample_rate_hz as u128;
        u64::try_from(ns).unwrap_or(u64::MAX)
    }

    pub fn drain_time_ns(&self) -> u64 {
        self.byte_time_ns.saturating_mul(self.frame_len)
    }

    /// Batch period minus drain time; negative when the deadline is missed
    pub fn margin_ns(&self) -> i64 {
        let margin = self.batch_period_ns() as i128 - self.drain_time_ns() as i128;
        margin.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn batch_period(&self) -> Duration {
        Duration::from_nanos(self.batch_period_ns())
    }

    pub fn drain_time(&self) -> Duration {
        Duration::from_nanos(self.drain_time_ns())
    }

    /// Whether every frame drains before its slot is reused
    pub fn is_met(&self) -> bool {
        self.drain_time_ns() < self.batch_period_ns()
    }

    /// Fraction of each batch period the link spends draining
    pub fn link_utilization(&self) -> f64 {
        self.drain_time_ns() as f64 / self.batch_period_ns() as f64
    }
}

impl std::fmt::Display for TimingBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch period {:.2} ms, drain {:.2} ms, link utilization {:.1}%",
            self.batch_period_ns() as f64 / 1e6,
            self.drain_time_ns() as f64 / 1e6,
            self.link_utilization() * 100.0
        )
    }
}
