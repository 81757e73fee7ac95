//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Everything here is fixed at startup; the running pipeline is never
//! reconfigured.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::device::DeviceTiming;
use crate::error::{DaqError, Result};
use crate::frame::layout::{FrameLayout, MAX_CHANNELS, MAX_SAMPLES_PER_BATCH};
use crate::pipeline::timing::TimingBudget;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Sampling and batching configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_channels")]
    pub channels: usize,

    #[serde(default = "default_samples_per_batch")]
    pub samples_per_batch: usize,

    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,

    #[serde(default = "default_conversion_time_us")]
    pub conversion_time_us: u32,
}

/// Serial link configuration (device side)
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_link_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_bits_per_byte")]
    pub bits_per_byte: u32,
}

/// Synthetic converter signal configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SignalConfig {
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,

    #[serde(default = "default_frequencies_hz")]
    pub frequencies_hz: Vec<f64>,

    #[serde(default)]
    pub noise: f64,
}

/// Receiver-side monitor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_port")]
    pub port: String,

    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    /// Also write every accepted sample to WAV recordings in `log_dir`
    #[serde(default)]
    pub record_samples: bool,

    #[serde(default = "default_max_frames_per_recording")]
    pub max_frames_per_recording: usize,
}

// Default value functions
fn default_channels() -> usize { 5 }
fn default_samples_per_batch() -> usize { 80 }
fn default_sample_rate_hz() -> u32 { 2000 }
fn default_conversion_time_us() -> u32 { 4 }

fn default_link_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 1_000_000 }
fn default_bits_per_byte() -> u32 { 10 }

fn default_amplitude() -> f64 { 0.5 }
fn default_frequencies_hz() -> Vec<f64> { vec![50.0, 100.0, 150.0, 200.0, 250.0] }

fn default_monitor_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_read_buffer() -> usize { 2048 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_max_frames_per_recording() -> usize { 1500 }

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            samples_per_batch: default_samples_per_batch(),
            sample_rate_hz: default_sample_rate_hz(),
            conversion_time_us: default_conversion_time_us(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: default_link_port(),
            baud_rate: default_baud_rate(),
            bits_per_byte: default_bits_per_byte(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            amplitude: default_amplitude(),
            frequencies_hz: default_frequencies_hz(),
            noise: 0.0,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: default_monitor_port(),
            read_buffer: default_read_buffer(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            record_samples: false,
            max_frames_per_recording: default_max_frames_per_recording(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> DaqError {
    DaqError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use daq_stream::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Frame shape described by the acquisition section
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(self.acquisition.channels, self.acquisition.samples_per_batch)
    }

    /// Sampling versus link timing
    pub fn timing_budget(&self) -> TimingBudget {
        TimingBudget::new(
            &self.layout(),
            self.acquisition.sample_rate_hz,
            self.link.baud_rate,
            self.link.bits_per_byte,
        )
    }

    /// Event source periods for the device model
    pub fn device_timing(&self) -> DeviceTiming {
        DeviceTiming::new(
            &self.timing_budget(),
            self.acquisition.conversion_time_us as u64 * 1_000,
        )
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range, or
    /// if a frame cannot drain within one batch period.
    pub fn validate(&self) -> Result<()> {
        let acquisition = &self.acquisition;

        if acquisition.channels == 0 || acquisition.channels > MAX_CHANNELS {
            return Err(invalid(format!("channels must be between 1 and {}", MAX_CHANNELS)));
        }

        if acquisition.samples_per_batch == 0 || acquisition.samples_per_batch > MAX_SAMPLES_PER_BATCH {
            return Err(invalid(format!(
                "samples_per_batch must be between 1 and {}",
                MAX_SAMPLES_PER_BATCH
            )));
        }

        if acquisition.sample_rate_hz == 0 || acquisition.sample_rate_hz > 200_000 {
            return Err(invalid("sample_rate_hz must be between 1 and 200000"));
        }

        let tick_period_us = 1_000_000 / acquisition.sample_rate_hz;
        if acquisition.conversion_time_us >= tick_period_us {
            return Err(invalid(format!(
                "conversion_time_us ({}) must be shorter than the sampling period ({} us)",
                acquisition.conversion_time_us, tick_period_us
            )));
        }

        // Validate link
        if self.link.port.is_empty() {
            return Err(invalid("link port cannot be empty"));
        }

        if self.link.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than 0"));
        }

        if !(7..=12).contains(&self.link.bits_per_byte) {
            return Err(invalid("bits_per_byte must be between 7 and 12"));
        }

        // Validate signal
        if !(0.0..=1.0).contains(&self.signal.amplitude) {
            return Err(invalid("amplitude must be between 0.0 and 1.0"));
        }

        if !(0.0..=1.0).contains(&self.signal.noise) {
            return Err(invalid("noise must be between 0.0 and 1.0"));
        }

        let nyquist = acquisition.sample_rate_hz as f64 / 2.0;
        for &frequency in &self.signal.frequencies_hz {
            if !(0.0..=nyquist).contains(&frequency) {
                return Err(invalid(format!(
                    "signal frequency {} Hz must be between 0 and {} Hz",
                    frequency, nyquist
                )));
            }
        }

        // Validate monitor
        if self.monitor.port.is_empty() {
            return Err(invalid("monitor port cannot be empty"));
        }

        if self.monitor.read_buffer == 0 {
            return Err(invalid("read_buffer must be greater than 0"));
        }

        // Validate telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.max_frames_per_recording == 0 {
            return Err(invalid("max_frames_per_recording must be greater than 0"));
        }

        // Every frame must drain before its slot is refilled
        let budget = self.timing_budget();
        if !budget.is_met() {
            return Err(invalid(format!(
                "link too slow for sampling rate: {}",
                budget
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout().frame_len(), 805);
        assert_eq!(config.link.baud_rate, 1_000_000);
        assert_eq!(config.acquisition.sample_rate_hz, 2000);
    }

    #[test]
    fn test_device_timing_from_defaults() {
        let timing = Config::default().device_timing();
        assert_eq!(timing.sample_rate_hz, 2000);
        assert_eq!(timing.tick_period_ns(), 500_000);
        assert_eq!(timing.conversion_ns, 4_000);
        assert_eq!(timing.byte_time_ns, 10_000);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.acquisition.channels, 5);
        assert_eq!(config.acquisition.samples_per_batch, 80);
        assert_eq!(config.signal.frequencies_hz.len(), 5);
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[acquisition]
channels = 4
samples_per_batch = 50
sample_rate_hz = 1000

[link]
port = "/dev/ttyACM0"
baud_rate = 921600

[signal]
amplitude = 0.25
frequencies_hz = [10.0, 20.0]

[monitor]

[telemetry]
enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.layout(), FrameLayout::new(4, 50));
        assert_eq!(config.link.port, "/dev/ttyACM0");
        assert_eq!(config.signal.frequencies_hz, vec![10.0, 20.0]);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.layout(), defaults.layout());
        assert_eq!(config.timing_budget(), defaults.timing_budget());
        assert_eq!(config.signal.frequencies_hz, defaults.signal.frequencies_hz);
        assert_eq!(config.monitor.port, defaults.monitor.port);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/daq-stream.toml");
        assert!(matches!(result, Err(DaqError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[acquisition\nchannels = 5");
        assert!(matches!(result, Err(DaqError::Config(_))));
    }

    #[test]
    fn test_zero_channels() {
        let mut config = Config::default();
        config.acquisition.channels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_too_many_channels() {
        let mut config = Config::default();
        config.acquisition.channels = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_samples_per_batch() {
        let mut config = Config::default();
        config.acquisition.samples_per_batch = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_batch_is_an_error_not_a_panic() {
        let toml = "[acquisition]\nsamples_per_batch = 100000000000000000\nsample_rate_hz = 1\n[signal]\nfrequencies_hz = [0.0]\n";
        match Config::from_toml(toml) {
            Err(DaqError::Config(e)) => assert!(e.to_string().contains("samples_per_batch")),
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_largest_batch_accepted() {
        // 4096 rows at 100 Hz give 40.96 s per batch, plenty for 40965 bytes
        let mut config = Config::default();
        config.acquisition.samples_per_batch = MAX_SAMPLES_PER_BATCH;
        config.acquisition.sample_rate_hz = 100;
        config.signal.frequencies_hz = vec![10.0];
        assert!(config.validate().is_ok());

        config.acquisition.samples_per_batch = MAX_SAMPLES_PER_BATCH + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_sample_rate() {
        let mut config = Config::default();
        config.acquisition.sample_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversion_longer_than_tick() {
        let mut config = Config::default();
        config.acquisition.conversion_time_us = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("conversion_time_us"));
    }

    #[test]
    fn test_empty_link_port() {
        let mut config = Config::default();
        config.link.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bits_per_byte() {
        let mut config = Config::default();
        config.link.bits_per_byte = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_amplitude_out_of_range() {
        let mut config = Config::default();
        config.signal.amplitude = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frequency_above_nyquist() {
        let mut config = Config::default();
        config.signal.frequencies_hz = vec![50.0, 1500.0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("1500"));
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_max_records() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_recording_settings() {
        let config = Config::from_toml(
            "[telemetry]\nrecord_samples = true\nmax_frames_per_recording = 25\n",
        )
        .unwrap();
        assert!(config.telemetry.record_samples);
        assert_eq!(config.telemetry.max_frames_per_recording, 25);
        assert!(!Config::default().telemetry.record_samples);

        let mut config = Config::default();
        config.telemetry.max_frames_per_recording = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_slow_link_rejected() {
        let mut config = Config::default();
        config.link.baud_rate = 115_200;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("link too slow"));
    }

    #[test]
    fn test_larger_batch_makes_slow_link_viable() {
        // 160-sample batches give 80 ms per frame; 1605 bytes at 230400 take ~69.7 ms
        let mut config = Config::default();
        config.link.baud_rate = 230_400;
        config.acquisition.samples_per_batch = 160;
        assert!(config.validate().is_ok());
    }
}
