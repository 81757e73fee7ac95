//! # DAQ Stream
//!
//! Multi-channel acquisition streamed as checksummed batch frames over a
//! serial link.
//!
//! Two subcommands share one configuration file:
//!
//! - `stream` runs the acquisition device against the wall clock and writes
//!   its frames to the link port
//! - `monitor` reads frames back from a port, reports gaps and records
//!   per-frame telemetry, optionally with the raw samples as WAV
//!
//! Either end can use UDP instead of a serial port.
//!
//! # Examples
//!
//! ```bash
//! daq-stream --config config/default.toml stream
//! daq-stream --config config/default.toml monitor --port /dev/ttyUSB1
//! daq-stream stream --udp 192.168.1.20:9000
//! daq-stream monitor --udp 0.0.0.0:9000 --record
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use daq_stream::config::Config;
use daq_stream::runtime::{Monitor, Streamer};
use daq_stream::serial::port_trait::SerialPortIO;
use daq_stream::serial::{LinkSerial, UdpLink};

/// DAQ Stream command line
#[derive(Parser, Debug)]
#[command(name = "daq-stream")]
#[command(version, about = "Batch-framed multi-channel acquisition over a serial link")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to daily files in this directory instead of stdout
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the acquisition device and stream frames to the link port
    Stream {
        /// Override the configured link port
        #[arg(short, long, conflicts_with = "udp")]
        port: Option<String>,

        /// Send frames as UDP datagrams to this address instead
        #[arg(long, value_name = "HOST:PORT")]
        udp: Option<String>,
    },
    /// Decode frames arriving on a port
    Monitor {
        /// Override the configured monitor port
        #[arg(short, long, conflicts_with = "udp")]
        port: Option<String>,

        /// Receive UDP datagrams on this address instead
        #[arg(long, value_name = "HOST:PORT")]
        udp: Option<String>,

        /// Do not write telemetry files
        #[arg(long)]
        no_telemetry: bool,

        /// Record every sample to WAV files next to the telemetry
        #[arg(long, conflicts_with = "no_telemetry")]
        record: bool,
    },
}

/// Install the tracing subscriber
///
/// The returned guard flushes the file writer on drop and must live until
/// the program exits.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "daq-stream.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, shutting down...");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_deref());

    info!("DAQ Stream v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;
    let layout = config.layout();
    info!(
        "{} channels x {} samples per batch, {}-byte frames",
        layout.channels(),
        layout.samples_per_batch(),
        layout.frame_len()
    );
    info!("Timing budget: {}", config.timing_budget());

    match cli.command {
        Commands::Stream { port, udp } => {
            let mut port: Box<dyn SerialPortIO> = match udp {
                Some(target) => Box::new(UdpLink::connect(&target).await?),
                None => {
                    let path = port.unwrap_or_else(|| config.link.port.clone());
                    let serial = LinkSerial::open_preferred(&path, config.link.baud_rate)?;
                    info!("Streaming to {}", serial.device_path());
                    Box::new(serial.into_io())
                }
            };

            let mut streamer = Streamer::from_config(&config);
            info!("Press Ctrl+C to exit");
            streamer.run(port.as_mut(), shutdown_signal()).await;
        }
        Commands::Monitor { port, udp, no_telemetry, record } => {
            if no_telemetry {
                config.telemetry.enabled = false;
            }
            if record {
                config.telemetry.record_samples = true;
            }

            let mut port: Box<dyn SerialPortIO> = match udp {
                Some(addr) => Box::new(UdpLink::bind(&addr).await?),
                None => {
                    let path = port.unwrap_or_else(|| config.monitor.port.clone());
                    let serial = LinkSerial::open_with_paths(&[path.as_str()], config.link.baud_rate)?;
                    info!("Monitoring {}", serial.device_path());
                    Box::new(serial.into_io())
                }
            };

            let mut monitor = Monitor::from_config(&config)?;
            info!("Press Ctrl+C to exit");
            monitor.run(port.as_mut(), shutdown_signal()).await?;
        }
    }

    Ok(())
}
