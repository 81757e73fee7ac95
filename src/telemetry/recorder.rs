//! Raw sample recorder
//!
//! Every accepted frame's samples are appended to a multichannel 16-bit PCM
//! WAV file at the acquisition rate. One WAV frame holds one sample row, so
//! any audio tool can open a recording.
//!
//! The RIFF and data sizes in the header are rewritten after each frame and
//! a recording stays readable if the process dies. Files are named
//! `samples_<UTC start time>_<index>.wav` and rotate like telemetry logs.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BufMut;
use tracing::{debug, info};

use super::files;
use crate::config::Config;
use crate::error::{DaqError, Result};
use crate::frame::decoder::BatchFrame;

const FILE_PREFIX: &str = "samples_";
const FILE_SUFFIX: &str = ".wav";

/// Size of the canonical PCM header
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT: u16 = 1;
const RIFF_SIZE_OFFSET: u64 = 4;
const DATA_SIZE_OFFSET: u64 = 40;

/// Header of a 16-bit PCM WAV file holding `data_len` bytes of samples
pub fn wav_header(channels: u16, sample_rate_hz: u32, data_len: u32) -> Vec<u8> {
    let block_align = channels.saturating_mul(BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate_hz.saturating_mul(block_align as u32);

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);
    header.put_slice(b"RIFF");
    header.put_u32_le(data_len.saturating_add(WAV_HEADER_LEN as u32 - 8));
    header.put_slice(b"WAVE");
    header.put_slice(b"fmt ");
    header.put_u32_le(16);
    header.put_u16_le(PCM_FORMAT);
    header.put_u16_le(channels);
    header.put_u32_le(sample_rate_hz);
    header.put_u32_le(byte_rate);
    header.put_u16_le(block_align);
    header.put_u16_le(BITS_PER_SAMPLE);
    header.put_slice(b"data");
    header.put_u32_le(data_len);
    header
}

/// WAV sample writer with file rotation
pub struct SampleRecorder {
    dir: PathBuf,
    channels: u16,
    sample_rate_hz: u32,
    max_frames_per_recording: usize,
    max_files_to_keep: usize,
    writer: BufWriter<File>,
    current_path: PathBuf,
    frames_in_file: usize,
    data_len: u32,
    file_index: u32,
    total_frames: u64,
}

impl std::fmt::Debug for SampleRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRecorder")
            .field("current_path", &self.current_path)
            .field("frames_in_file", &self.frames_in_file)
            .field("total_frames", &self.total_frames)
            .finish_non_exhaustive()
    }
}

impl SampleRecorder {
    /// Create the directory if needed and start the first recording
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        channels: usize,
        sample_rate_hz: u32,
        max_frames_per_recording: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let channels = u16::try_from(channels)
            .map_err(|_| DaqError::Frame(format!("{} channels cannot be recorded", channels)))?;
        fs::create_dir_all(&dir)?;

        let (writer, current_path) = open_recording(&dir, 0, channels, sample_rate_hz)?;
        info!("Recording samples to {}", current_path.display());

        let recorder = Self {
            dir,
            channels,
            sample_rate_hz,
            max_frames_per_recording: max_frames_per_recording.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer,
            current_path,
            frames_in_file: 0,
            data_len: 0,
            file_index: 0,
            total_frames: 0,
        };
        recorder.prune()?;
        Ok(recorder)
    }

    /// Recorder writing into the telemetry directory
    pub fn from_config(config: &Config) -> Result<Self> {
        let telemetry = &config.telemetry;
        Self::new(
            &telemetry.log_dir,
            config.acquisition.channels,
            config.acquisition.sample_rate_hz,
            telemetry.max_frames_per_recording,
            telemetry.max_files_to_keep,
        )
    }

    /// Append the rows of `frame`, rotating first if the recording is full
    ///
    /// # Errors
    ///
    /// Returns `Frame` if the frame's channel count differs from the
    /// recording's, or an I/O error from the file.
    pub fn record(&mut self, frame: &BatchFrame) -> Result<()> {
        if frame.channels() != self.channels as usize {
            return Err(DaqError::Frame(format!(
                "Cannot record {} channels into a {}-channel recording",
                frame.channels(),
                self.channels
            )));
        }

        let mut data = Vec::with_capacity(frame.samples().len() * 2);
        for &sample in frame.samples() {
            data.put_i16_le(sample);
        }
        let added = u32::try_from(data.len()).unwrap_or(u32::MAX);

        let header_room = u32::MAX - WAV_HEADER_LEN as u32;
        if self.frames_in_file >= self.max_frames_per_recording
            || self.data_len.saturating_add(added) > header_room
        {
            self.rotate()?;
        }

        self.writer.write_all(&data)?;
        self.data_len = self.data_len.saturating_add(added);
        self.patch_sizes()?;

        self.frames_in_file += 1;
        self.total_frames += 1;
        Ok(())
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Rewrite the header sizes and return to the end of the data
    fn patch_sizes(&mut self) -> Result<()> {
        let riff_size = self.data_len.saturating_add(WAV_HEADER_LEN as u32 - 8);

        self.writer.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.writer.write_all(&self.data_len.to_le_bytes())?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.file_index += 1;

        let (writer, path) = open_recording(&self.dir, self.file_index, self.channels, self.sample_rate_hz)?;
        debug!("Rotated sample recording to {}", path.display());

        self.writer = writer;
        self.current_path = path;
        self.frames_in_file = 0;
        self.data_len = 0;
        self.prune()
    }

    fn prune(&self) -> Result<()> {
        files::prune_oldest(&self.dir, FILE_PREFIX, FILE_SUFFIX, self.max_files_to_keep, &self.current_path)
    }
}

fn open_recording(dir: &Path, index: u32, channels: u16, sample_rate_hz: u32) -> Result<(BufWriter<File>, PathBuf)> {
    let path = files::rotated_path(dir, FILE_PREFIX, index, FILE_SUFFIX);
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;

    let mut writer = BufWriter::new(file);
    writer.write_all(&wav_header(channels, sample_rate_hz, 0))?;
    writer.flush()?;
    Ok((writer, path))
}
