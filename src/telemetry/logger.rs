//! Rotating JSONL writer
//!
//! Files are named `frames_<UTC start time>_<index>.jsonl`, so sorting the
//! names sorts them by age. A file is closed after `max_records_per_file`
//! records and the oldest files beyond `max_files_to_keep` are deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::files;
use super::types::FrameRecord;
use crate::config::TelemetryConfig;
use crate::error::Result;

const FILE_PREFIX: &str = "frames_";
const FILE_SUFFIX: &str = ".jsonl";

/// JSONL telemetry writer with file rotation
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: BufWriter<File>,
    current_path: PathBuf,
    records_in_file: usize,
    file_index: u32,
    total_records: u64,
}

impl std::fmt::Debug for TelemetryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLogger")
            .field("current_path", &self.current_path)
            .field("records_in_file", &self.records_in_file)
            .field("total_records", &self.total_records)
            .finish_non_exhaustive()
    }
}

impl TelemetryLogger {
    /// Create the log directory if needed and open the first file
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let (writer, current_path) = open_log_file(&dir, 0)?;
        info!("Telemetry logging to {}", current_path.display());

        let logger = Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer,
            current_path,
            records_in_file: 0,
            file_index: 0,
            total_records: 0,
        };
        logger.prune()?;
        Ok(logger)
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// Append one record, rotating first if the current file is full
    pub fn log(&mut self, record: &FrameRecord) -> Result<()> {
        if self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        self.records_in_file += 1;
        self.total_records += 1;
        Ok(())
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    fn rotate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.file_index += 1;

        let (writer, path) = open_log_file(&self.dir, self.file_index)?;
        debug!("Rotated telemetry log to {}", path.display());

        self.writer = writer;
        self.current_path = path;
        self.records_in_file = 0;
        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit
    fn prune(&self) -> Result<()> {
        files::prune_oldest(&self.dir, FILE_PREFIX, FILE_SUFFIX, self.max_files_to_keep, &self.current_path)
    }
}

fn open_log_file(dir: &Path, index: u32) -> Result<(BufWriter<File>, PathBuf)> {
    let path = files::rotated_path(dir, FILE_PREFIX, index, FILE_SUFFIX);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((BufWriter::new(file), path))
}

/// Telemetry files in `dir`, unsorted
fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    files::matching_files(dir, FILE_PREFIX, FILE_SUFFIX)
}
