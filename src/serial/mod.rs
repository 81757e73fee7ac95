//! # Serial Link Module
//!
//! Host-side access to the serial link carrying batch frames.
//!
//! The same port settings serve both ends: the streamer writes frames out,
//! the monitor reads them back. Ports are always opened 8N1 with no flow
//! control; only the baud rate is configurable. [`UdpLink`] carries the
//! same byte stream over UDP instead.

pub mod port_trait;
pub mod udp;

pub use udp::UdpLink;

use crate::error::{DaqError, Result};
use port_trait::TokioSerialPort;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Common USB serial device paths, tried after the configured one
pub const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyACM0", // USB CDC devices
];

/// Serial link handle
pub struct LinkSerial {
    port: tokio_serial::SerialStream,
    device_path: String,
    baud_rate: u32,
}

impl std::fmt::Debug for LinkSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSerial")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl LinkSerial {
    /// Open the first device that succeeds, trying `paths` in order
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried when none open.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use daq_stream::serial::LinkSerial;
    ///
    /// let serial = LinkSerial::open_with_paths(&["/dev/ttyUSB0"], 1_000_000)?;
    /// println!("Streaming on {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened serial link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                        baud_rate,
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(DaqError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open the configured path, falling back to the common device paths
    pub fn open_preferred(path: &str, baud_rate: u32) -> Result<Self> {
        let mut paths = vec![path];
        paths.extend(FALLBACK_DEVICE_PATHS.iter().copied().filter(|p| *p != path));
        Self::open_with_paths(&paths, baud_rate)
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| DaqError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Path of the device that was opened
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Hand the port over to the runtime loops
    pub fn into_io(self) -> TokioSerialPort {
        TokioSerialPort::new(self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_paths() {
        assert_eq!(FALLBACK_DEVICE_PATHS.len(), 2);
        assert_eq!(FALLBACK_DEVICE_PATHS[0], "/dev/ttyUSB0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = LinkSerial::open_with_paths(invalid_paths, 1_000_000);

        match result.unwrap_err() {
            DaqError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = LinkSerial::open_with_paths(empty_paths, 1_000_000);

        assert!(matches!(result, Err(DaqError::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = LinkSerial::open_port("/dev/nonexistent_serial_device_12345", 115_200);

        match result.unwrap_err() {
            DaqError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[test]
    #[ignore] // Needs a serial device attached: cargo test -- --ignored
    fn test_open_with_real_hardware() {
        match LinkSerial::open_preferred("/dev/ttyUSB0", 1_000_000) {
            Ok(serial) => {
                assert!(serial.device_path().starts_with("/dev/tty"));
                assert_eq!(serial.baud_rate(), 1_000_000);
            }
            Err(e) => println!("No serial hardware detected: {}", e),
        }
    }
}
