//! Receiver loop: serial port to decoded frames and telemetry

use std::future::Future;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{DaqError, Result};
use crate::frame::decoder::{StreamDecoder, StreamStats};
use crate::frame::layout::FrameLayout;
use crate::serial::port_trait::SerialPortIO;
use crate::telemetry::{FrameRecord, SampleRecorder, TelemetryLogger};

/// Frame monitor
#[derive(Debug)]
pub struct Monitor {
    decoder: StreamDecoder,
    telemetry: Option<TelemetryLogger>,
    recorder: Option<SampleRecorder>,
    read_buffer: usize,
}

impl Monitor {
    pub fn new(layout: FrameLayout, telemetry: Option<TelemetryLogger>, read_buffer: usize) -> Self {
        Self {
            decoder: StreamDecoder::new(layout),
            telemetry,
            recorder: None,
            read_buffer: read_buffer.max(1),
        }
    }

    /// Also record the samples of every accepted frame
    pub fn with_recorder(mut self, recorder: Option<SampleRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Monitor with telemetry and sample recording set up as configured
    ///
    /// # Errors
    ///
    /// Returns error if telemetry is enabled and its log directory cannot be
    /// created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (telemetry, recorder) = if config.telemetry.enabled {
            let recorder = if config.telemetry.record_samples {
                Some(SampleRecorder::from_config(config)?)
            } else {
                None
            };
            (Some(TelemetryLogger::from_config(&config.telemetry)?), recorder)
        } else {
            (None, None)
        };

        Ok(Self::new(config.layout(), telemetry, config.monitor.read_buffer).with_recorder(recorder))
    }

    pub fn stats(&self) -> StreamStats {
        self.decoder.stats()
    }

    pub fn telemetry(&self) -> Option<&TelemetryLogger> {
        self.telemetry.as_ref()
    }

    pub fn recorder(&self) -> Option<&SampleRecorder> {
        self.recorder.as_ref()
    }

    /// Decode everything that `data` completes
    ///
    /// Returns the number of frames accepted.
    ///
    /// # Errors
    ///
    /// Returns error if a telemetry record or recording cannot be written.
    pub fn ingest(&mut self, data: &[u8]) -> Result<usize> {
        self.decoder.push(data);

        let mut accepted = 0;
        while let Some(received) = self.decoder.next_frame() {
            accepted += 1;
            debug!(
                "Frame {} ({} rows, checksum {:#06x}, {} lost)",
                received.frame.sequence,
                received.frame.len(),
                received.frame.checksum,
                received.lost_frames
            );

            if let Some(logger) = self.telemetry.as_mut() {
                logger.log(&FrameRecord::from_received(&received))?;
            }
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.record(&received.frame)?;
            }
        }

        Ok(accepted)
    }

    /// Read and decode until the port closes or `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns `Serial` on a read failure, or the telemetry error that
    /// stopped the loop.
    pub async fn run<P, F>(&mut self, port: &mut P, shutdown: F) -> Result<StreamStats>
    where
        P: SerialPortIO + ?Sized,
        F: Future<Output = ()>,
    {
        let mut buf = vec![0u8; self.read_buffer];
        tokio::pin!(shutdown);

        info!("Monitoring link ({} byte reads)", self.read_buffer);

        loop {
            tokio::select! {
                read = port.read(&mut buf) => {
                    match read {
                        Ok(0) => {
                            warn!("Serial port closed");
                            break;
                        }
                        Ok(n) => {
                            self.ingest(&buf[..n])?;
                        }
                        Err(e) => {
                            return Err(DaqError::Serial(format!("Failed to read serial port: {}", e)));
                        }
                    }
                }

                _ = &mut shutdown => {
                    break;
                }
            }
        }

        let stats = self.decoder.stats();
        info!(
            "Received {} frames, {} lost, {} duplicates, {} bytes rejected",
            stats.frames, stats.lost_frames, stats.duplicates, stats.skipped_bytes
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::encode_frame;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use std::future::pending;
    use tempfile::TempDir;

    fn layout() -> FrameLayout {
        FrameLayout::new(2, 4)
    }

    fn frame(sequence: u8) -> Vec<u8> {
        let samples: Vec<i16> = (0..8).map(|i| i * 100 + sequence as i16).collect();
        encode_frame(&layout(), sequence, &samples).unwrap()
    }

    #[test]
    fn test_ingest_counts_frames_and_gaps() {
        let mut monitor = Monitor::new(layout(), None, 64);

        let mut stream = Vec::new();
        stream.extend(frame(0));
        stream.extend(frame(1));
        stream.extend(frame(4));

        assert_eq!(monitor.ingest(&stream).unwrap(), 3);
        let stats = monitor.stats();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.lost_frames, 2);
    }

    #[test]
    fn test_ingest_across_partial_reads() {
        let mut monitor = Monitor::new(layout(), None, 64);
        let bytes = frame(7);

        assert_eq!(monitor.ingest(&bytes[..5]).unwrap(), 0);
        assert_eq!(monitor.ingest(&bytes[5..]).unwrap(), 1);
    }

    #[test]
    fn test_ingest_writes_telemetry() {
        let temp = TempDir::new().unwrap();
        let logger = TelemetryLogger::new(temp.path(), 100, 2).unwrap();
        let mut monitor = Monitor::new(layout(), Some(logger), 64);

        let mut stream = frame(0);
        stream.extend(frame(2));
        monitor.ingest(&stream).unwrap();

        let logger = monitor.telemetry().unwrap();
        assert_eq!(logger.total_records(), 2);

        let contents = std::fs::read_to_string(logger.current_path()).unwrap();
        let records: Vec<FrameRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records[0].sequence, 0);
        assert_eq!(records[1].sequence, 2);
        assert_eq!(records[1].lost_frames, 1);
        assert_eq!(records[1].channel_min, vec![2, 102]);
        assert_eq!(records[1].channel_max, vec![602, 702]);
    }

    #[test]
    fn test_ingest_records_samples() {
        let temp = TempDir::new().unwrap();
        let recorder = SampleRecorder::new(temp.path(), 2, 2000, 100, 2).unwrap();
        let mut monitor = Monitor::new(layout(), None, 64).with_recorder(Some(recorder));

        let mut stream = frame(3);
        stream.extend(frame(4));
        assert_eq!(monitor.ingest(&stream).unwrap(), 2);

        let recorder = monitor.recorder().unwrap();
        assert_eq!(recorder.total_frames(), 2);

        let bytes = std::fs::read(recorder.current_path()).unwrap();
        let samples: Vec<i16> = bytes[crate::telemetry::recorder::WAV_HEADER_LEN..]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let expected: Vec<i16> = [3i16, 4]
            .iter()
            .flat_map(|&seq| (0..8).map(move |i| i * 100 + seq))
            .collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_from_config_records_when_enabled() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.telemetry.log_dir = temp.path().to_string_lossy().into_owned();
        config.telemetry.record_samples = true;

        let monitor = Monitor::from_config(&config).unwrap();
        assert!(monitor.telemetry().is_some());
        assert!(monitor.recorder().is_some());

        config.telemetry.record_samples = false;
        assert!(Monitor::from_config(&config).unwrap().recorder().is_none());
    }

    #[test]
    fn test_from_config_without_telemetry() {
        let mut config = Config::default();
        config.telemetry.enabled = false;

        let monitor = Monitor::from_config(&config).unwrap();
        assert!(monitor.telemetry().is_none());
    }

    #[tokio::test]
    async fn test_run_until_port_closes() {
        let mut monitor = Monitor::new(layout(), None, 16);
        let mut port = MockSerialPort::new();

        // Line noise, a frame, a corrupted frame, a duplicate, then a gap
        port.queue_read(&[0x00, 0xAA, 0x13]);
        port.queue_read(&frame(10));
        let mut corrupted = frame(11);
        corrupted[5] ^= 0xFF;
        port.queue_read(&corrupted);
        port.queue_read(&frame(10));
        port.queue_read(&frame(13));

        let stats = monitor.run(&mut port, pending()).await.unwrap();

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.lost_frames, 2);
        assert!(stats.skipped_bytes >= 3);
    }

    #[tokio::test]
    async fn test_run_read_error() {
        let mut monitor = Monitor::new(layout(), None, 16);
        let mut port = MockSerialPort::new();
        port.set_read_error(std::io::ErrorKind::BrokenPipe);

        let result = monitor.run(&mut port, pending()).await;
        match result {
            Err(DaqError::Serial(msg)) => assert!(msg.contains("Failed to read")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut monitor = Monitor::new(layout(), None, 16);
        let mut port = MockSerialPort::new();
        port.queue_read(&frame(0));

        // Shutdown is already complete; the loop exits without error
        let stats = monitor.run(&mut port, std::future::ready(())).await.unwrap();
        assert!(stats.frames <= 1);
    }
}
