//! # Device Model
//!
//! Single-core, interrupt-driven execution of the acquisition pipeline in
//! virtual time.
//!
//! Three hardware event sources feed the handlers:
//!
//! | Event | Source | Handler |
//! |---|---|---|
//! | `ConversionReady` | converter, `conversion_ns` after a tick | acquisition |
//! | `Tick` | sampling timer, every tick period | scheduler |
//! | `ByteSent` | link, one byte time after a byte is loaded | transmitter |
//!
//! Events due at the same instant are delivered in that order (hardware
//! vector priority). Every handler runs to completion. An event whose line is
//! masked when it fires is dropped, as a disabled interrupt would be. With no
//! event due, the device is idle and does nothing.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use tracing::trace;

use crate::frame::batch::{BatchBuffer, Slot, SlotRole};
use crate::frame::layout::FrameLayout;
use crate::hal::sim::SimLine;
use crate::hal::{AdcDriver, EventLine, SerialTx};
use crate::pipeline::acquisition::AcquisitionHandler;
use crate::pipeline::scheduler::SampleScheduler;
use crate::pipeline::timing::TimingBudget;
use crate::pipeline::transmitter::{LinkHandoff, Transmitter};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Hardware events, declared in delivery priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceEvent {
    ConversionReady,
    Tick,
    ByteSent,
}

/// Event source timing
///
/// Ticks are placed at `n × 1 s / sample_rate_hz`, rounded down per tick,
/// so rates that do not divide 1 s do not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTiming {
    pub sample_rate_hz: u32,
    pub conversion_ns: u64,
    pub byte_time_ns: u64,
}

impl DeviceTiming {
    pub fn new(budget: &TimingBudget, conversion_ns: u64) -> Self {
        Self {
            sample_rate_hz: budget.sample_rate_hz(),
            conversion_ns,
            byte_time_ns: budget.byte_time_ns(),
        }
    }

    /// Nominal tick period, truncated to whole nanoseconds
    pub fn tick_period_ns(&self) -> u64 {
        NANOS_PER_SEC / self.sample_rate_hz.max(1) as u64
    }

    /// Virtual time of the `n`th tick (the first tick is `n = 1`)
    pub fn tick_at_ns(&self, n: u64) -> u64 {
        let ns = n as u128 * NANOS_PER_SEC as u128 / self.sample_rate_hz.max(1) as u128;
        u64::try_from(ns).unwrap_or(u64::MAX)
    }
}

/// Counters gathered across the handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub ticks: u64,
    pub overlapped_ticks: u64,
    pub frames_completed: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub preempted_drains: u64,
    pub masked_ready_events: u64,
    pub masked_link_events: u64,
}

/// The acquisition device: peripherals, handlers and shared buffer
pub struct Device<A: AdcDriver, S: SerialTx> {
    timing: DeviceTiming,
    now_ns: u64,
    queue: BinaryHeap<Reverse<(u64, DeviceEvent, u64)>>,
    next_id: u64,
    next_tick: u64,
    byte_in_flight: bool,

    adc: A,
    serial: S,
    ready_line: SimLine,
    link_line: SimLine,

    buffer: BatchBuffer,
    scheduler: SampleScheduler,
    acquisition: AcquisitionHandler,
    transmitter: Transmitter,

    masked_ready_events: u64,
    masked_link_events: u64,
}

impl<A: AdcDriver, S: SerialTx> Device<A, S> {
    /// Power-on: allocate the buffer, start the sampling timer
    pub fn new(layout: FrameLayout, timing: DeviceTiming, adc: A, serial: S) -> Self {
        assert!(timing.sample_rate_hz > 0, "sample rate must be non-zero");

        let mut device = Self {
            timing,
            now_ns: 0,
            queue: BinaryHeap::new(),
            next_id: 0,
            next_tick: 1,
            byte_in_flight: false,
            adc,
            serial,
            ready_line: SimLine::new(),
            link_line: SimLine::new(),
            buffer: BatchBuffer::new(layout),
            scheduler: SampleScheduler::new(),
            acquisition: AcquisitionHandler::new(layout),
            transmitter: Transmitter::new(),
            masked_ready_events: 0,
            masked_link_events: 0,
        };

        device.schedule(timing.tick_at_ns(1), DeviceEvent::Tick);
        device
    }

    /// Virtual time in nanoseconds
    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns)
    }

    pub fn timing(&self) -> DeviceTiming {
        self.timing
    }

    pub fn layout(&self) -> FrameLayout {
        self.buffer.layout()
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    pub fn scheduler(&self) -> &SampleScheduler {
        &self.scheduler
    }

    pub fn acquisition(&self) -> &AcquisitionHandler {
        &self.acquisition
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Live role of `slot`
    ///
    /// A handed-off slot only counts as draining while the transmitter's
    /// cursor is on it; once the drain finishes it reads as idle.
    pub fn slot_role(&self, slot: Slot) -> SlotRole {
        match self.buffer.role(slot) {
            SlotRole::Draining => match self.transmitter.cursor() {
                Some(cursor) if cursor.slot == slot => SlotRole::Draining,
                _ => SlotRole::Idle,
            },
            role => role,
        }
    }

    /// Whether link-ready events are currently unmasked
    pub fn link_enabled(&self) -> bool {
        self.link_line.is_enabled()
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            ticks: self.scheduler.ticks(),
            overlapped_ticks: self.scheduler.overlapped_ticks(),
            frames_completed: self.acquisition.batches(),
            frames_sent: self.transmitter.frames_sent(),
            bytes_sent: self.transmitter.bytes_sent(),
            preempted_drains: self.transmitter.preempted_drains(),
            masked_ready_events: self.masked_ready_events,
            masked_link_events: self.masked_link_events,
        }
    }

    /// Time of the next pending event
    pub fn next_event_at(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse((at, _, _))| *at)
    }

    /// Deliver the next pending event
    pub fn step(&mut self) -> Option<DeviceEvent> {
        let Reverse((at, event, _)) = self.queue.pop()?;
        self.now_ns = at;
        self.dispatch(event);
        Some(event)
    }

    /// Deliver every event due up to and including `deadline_ns`, then idle
    /// until `deadline_ns`
    ///
    /// Returns the number of events delivered.
    pub fn run_until(&mut self, deadline_ns: u64) -> usize {
        let mut delivered = 0;

        while self.next_event_at().is_some_and(|at| at <= deadline_ns) {
            self.step();
            delivered += 1;
        }

        self.now_ns = self.now_ns.max(deadline_ns);
        delivered
    }

    /// Advance virtual time by `elapsed`
    pub fn run_for(&mut self, elapsed: Duration) -> usize {
        let elapsed_ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.run_until(self.now_ns.saturating_add(elapsed_ns))
    }

    fn schedule(&mut self, at: u64, event: DeviceEvent) {
        self.queue.push(Reverse((at, event, self.next_id)));
        self.next_id += 1;
    }

    fn dispatch(&mut self, event: DeviceEvent) {
        trace!("t={}ns {:?}", self.now_ns, event);
        let bytes_before = self.transmitter.bytes_sent();

        match event {
            DeviceEvent::Tick => {
                self.scheduler.on_tick(&mut self.adc, &mut self.ready_line);
                self.next_tick += 1;
                self.schedule(self.timing.tick_at_ns(self.next_tick), DeviceEvent::Tick);
                self.schedule(self.now_ns + self.timing.conversion_ns, DeviceEvent::ConversionReady);
            }
            DeviceEvent::ConversionReady => {
                if self.ready_line.is_enabled() {
                    self.scheduler.on_conversion_consumed();

                    let mut link = LinkHandoff {
                        transmitter: &mut self.transmitter,
                        serial: &mut self.serial,
                        link: &mut self.link_line,
                    };
                    self.acquisition.on_conversion_ready(
                        &mut self.buffer,
                        &mut self.adc,
                        &mut self.ready_line,
                        &mut link,
                    );
                } else {
                    self.masked_ready_events += 1;
                }
            }
            DeviceEvent::ByteSent => {
                self.byte_in_flight = false;
                if self.link_line.is_enabled() {
                    self.transmitter
                        .on_byte_sent(&self.buffer, &mut self.serial, &mut self.link_line);
                } else {
                    self.masked_link_events += 1;
                }
            }
        }

        // A byte loaded into an idle shift register completes one byte time later
        if self.transmitter.bytes_sent() != bytes_before && !self.byte_in_flight {
            self.byte_in_flight = true;
            self.schedule(self.now_ns + self.timing.byte_time_ns, DeviceEvent::ByteSent);
        }
    }
}

impl<A: AdcDriver, S: SerialTx> std::fmt::Debug for Device<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("now_ns", &self.now_ns)
            .field("timing", &self.timing)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
