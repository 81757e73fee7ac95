//! Wall-clock driver for the device model

use std::future::Future;

use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::Config;
use crate::device::{Device, DeviceStats};
use crate::error::{DaqError, Result};
use crate::hal::sim::{ByteSink, SyntheticAdc};
use crate::hal::AdcDriver;
use crate::serial::port_trait::SerialPortIO;

/// Wall time between pumps
pub const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Number of frames between status log messages
pub const LOG_INTERVAL_FRAMES: u64 = 100;

/// Runs a device and forwards its link bytes to a serial port
#[derive(Debug)]
pub struct Streamer<A: AdcDriver> {
    device: Device<A, ByteSink>,
    last_logged_frames: u64,
}

impl Streamer<SyntheticAdc> {
    /// Device with a synthetic converter, as configured
    pub fn from_config(config: &Config) -> Self {
        let signal = &config.signal;
        let adc = SyntheticAdc::new(
            config.acquisition.channels,
            config.acquisition.sample_rate_hz,
            signal.amplitude,
            &signal.frequencies_hz,
            signal.noise,
        );

        Self::new(Device::new(
            config.layout(),
            config.device_timing(),
            adc,
            ByteSink::new(),
        ))
    }
}

impl<A: AdcDriver> Streamer<A> {
    pub fn new(device: Device<A, ByteSink>) -> Self {
        Self {
            device,
            last_logged_frames: 0,
        }
    }

    pub fn device(&self) -> &Device<A, ByteSink> {
        &self.device
    }

    /// Advance the device by `elapsed` and write out what the link emitted
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the port rejects the write or flush. The bytes of
    /// that pump are lost; the device keeps running.
    pub async fn pump<P>(&mut self, port: &mut P, elapsed: Duration) -> Result<usize>
    where
        P: SerialPortIO + ?Sized,
    {
        self.device.run_for(elapsed);
        let bytes = self.device.serial_mut().take();

        if !bytes.is_empty() {
            port.write_all(&bytes).await
                .map_err(|e| DaqError::Serial(format!("Failed to write link data: {}", e)))?;

            port.flush().await
                .map_err(|e| DaqError::Serial(format!("Failed to flush serial port: {}", e)))?;
        }

        let stats = self.device.stats();
        if stats.frames_completed - self.last_logged_frames >= LOG_INTERVAL_FRAMES {
            info!(
                "Streamed {} frames ({} bytes, {} drains preempted)",
                stats.frames_completed, stats.bytes_sent, stats.preempted_drains
            );
            self.last_logged_frames = stats.frames_completed;
        }

        Ok(bytes.len())
    }

    /// Pump every [`PUMP_INTERVAL`] until `shutdown` completes
    ///
    /// Virtual time follows the wall clock; a late pump catches up by the
    /// full elapsed time. Write failures are logged and skipped.
    pub async fn run<P, F>(&mut self, port: &mut P, shutdown: F) -> DeviceStats
    where
        P: SerialPortIO + ?Sized,
        F: Future<Output = ()>,
    {
        let mut ticker = interval(PUMP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        tokio::pin!(shutdown);

        info!("Streaming started ({} ms pump interval)", PUMP_INTERVAL.as_millis());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now - last;
                    last = now;

                    if let Err(e) = self.pump(port, elapsed).await {
                        debug!("{}", e);
                    }
                }

                _ = &mut shutdown => {
                    break;
                }
            }
        }

        let stats = self.device.stats();
        info!(
            "Streaming stopped after {:.3} s: {} frames, {} bytes",
            self.device.now().as_secs_f64(),
            stats.frames_completed,
            stats.bytes_sent
        );
        stats
    }
}
