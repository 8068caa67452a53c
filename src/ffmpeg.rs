//! # External Encoder Module
//!
//! Il confine verso i processi esterni: probing della durata, transcodifica
//! video ed estrazione di un singolo frame. Il trait `MediaTools` permette al
//! `VideoProcessor` di essere testato senza ffmpeg installato.
//!
//! ## Comandi:
//! - `ffprobe -show_entries format=duration`: durata in secondi su stdout
//! - `ffmpeg ... libsvtav1 / libopus`: transcodifica a WebM 900px
//! - `ffmpeg -ss <ts> -vframes 1`: frame JPEG 400px per la thumbnail
//!
//! Exit code 0 = successo, qualsiasi altro codice = fallimento.

use crate::args;
use crate::error::PipelineError;
use crate::platform::PlatformCommands;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Width of transcoded videos; height follows (kept even)
pub const VIDEO_WIDTH: u32 = 900;
/// Width of extracted thumbnail frames
pub const THUMBNAIL_WIDTH: u32 = 400;
const VIDEO_CODEC: &str = "libsvtav1";
const VIDEO_CRF: &str = "45";
const VIDEO_SPEED_PRESET: &str = "8";
const AUDIO_CODEC: &str = "libopus";
const AUDIO_BITRATE: &str = "64k";

/// External media operations used by the video pipeline
pub trait MediaTools: Send + Sync {
    /// Duration of `input` in seconds. Non-positive values are reported as `ProbeFailure`.
    fn probe_duration(&self, input: &Path) -> Result<f64, PipelineError>;

    /// Transcode `input` into `output` using `threads` encoder threads
    fn transcode(&self, input: &Path, output: &Path, threads: usize) -> Result<(), PipelineError>;

    /// Grab one scaled frame at `timestamp` (already formatted, in seconds) into `output`
    fn extract_frame(&self, input: &Path, timestamp: &str, output: &Path) -> Result<(), PipelineError>;
}

/// `MediaTools` backed by the ffmpeg/ffprobe executables
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: PlatformCommands::get_command("ffmpeg"),
            ffprobe: PlatformCommands::get_command("ffprobe"),
        }
    }
}

impl FfmpegTools {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(program: &str, args: Vec<OsString>, input: &Path) -> Result<Output, PipelineError> {
        debug!("Running {} {:?}", program, args);
        let output = Command::new(program).args(&args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::MissingDependency(program.to_string())
            } else {
                PipelineError::Io(e)
            }
        })?;
        if !output.status.success() {
            debug!(
                "{} failed for {}: {}",
                program,
                input.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(PipelineError::TranscodeFailure {
                path: input.to_path_buf(),
                code: output.status.code(),
            });
        }
        Ok(output)
    }
}

/// Parse the single number ffprobe prints for `format=duration`
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

impl MediaTools for FfmpegTools {
    fn probe_duration(&self, input: &Path) -> Result<f64, PipelineError> {
        let args = args![
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=1",
            input,
        ];
        let output = Self::run(&self.ffprobe, args, input).map_err(|e| PipelineError::ProbeFailure {
            path: input.to_path_buf(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_duration(&stdout).ok_or_else(|| PipelineError::ProbeFailure {
            path: input.to_path_buf(),
            reason: format!("unusable duration {:?}", stdout.trim()),
        })
    }

    fn transcode(&self, input: &Path, output: &Path, threads: usize) -> Result<(), PipelineError> {
        let args = args![
            "-y",
            "-i", input,
            "-vf", format!("scale={}:-2", VIDEO_WIDTH),
            "-c:v", VIDEO_CODEC,
            "-crf", VIDEO_CRF,
            "-b:v", "0",
            "-cpu-used", VIDEO_SPEED_PRESET,
            "-threads", threads.to_string(),
            "-row-mt", "1",
            "-strict", "experimental",
            "-c:a", AUDIO_CODEC,
            "-b:a", AUDIO_BITRATE,
            output,
        ];
        Self::run(&self.ffmpeg, args, input).map(|_| ())
    }

    fn extract_frame(&self, input: &Path, timestamp: &str, output: &Path) -> Result<(), PipelineError> {
        let args = args![
            "-y",
            "-i", input,
            "-ss", timestamp,
            "-vframes", "1",
            "-vf", format!("scale={}:-1", THUMBNAIL_WIDTH),
            output,
        ];
        Self::run(&self.ffmpeg, args, input).map(|_| ())
    }
}
