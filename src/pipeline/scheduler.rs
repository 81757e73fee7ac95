//! # Sample Scheduler
//!
//! Runs on the periodic sampling clock. Each tick starts a conversion and
//! arms the conversion-ready event; the acquisition handler consumes that
//! event. The scheduler never touches batch or sample state.

use tracing::trace;

use crate::hal::{AdcDriver, EventLine};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// Conversion started, waiting for conversion-ready
    Armed,
}

/// Periodic conversion trigger
#[derive(Debug, Clone)]
pub struct SampleScheduler {
    state: SchedulerState,
    ticks: u64,
    overlapped_ticks: u64,
}

impl Default for SampleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            ticks: 0,
            overlapped_ticks: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Ticks handled so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks that arrived while the previous conversion was still unconsumed
    pub fn overlapped_ticks(&self) -> u64 {
        self.overlapped_ticks
    }

    /// Timer tick: start a conversion and arm the ready event
    pub fn on_tick<A, L>(&mut self, adc: &mut A, ready_line: &mut L)
    where
        A: AdcDriver + ?Sized,
        L: EventLine + ?Sized,
    {
        if self.state == SchedulerState::Armed {
            self.overlapped_ticks += 1;
            trace!("Tick {} while previous conversion still pending", self.ticks);
        }

        adc.start_conversion();
        ready_line.enable();

        self.state = SchedulerState::Armed;
        self.ticks += 1;
    }

    /// The conversion-ready event was taken by the acquisition handler
    pub fn on_conversion_consumed(&mut self) {
        self.state = SchedulerState::Idle;
    }
}
