//! # Video Processing Module
//!
//! Questo modulo gestisce la transcodifica dei video e la generazione delle thumbnail.
//!
//! ## Responsabilità:
//! - Transcodifica a WebM (AV1 + Opus, 900px) tramite ffmpeg
//! - Thumbnail WebP 400px estratta da un singolo frame
//! - Fallback su più timestamp quando l'estrazione fallisce
//!
//! ## Due fasi indipendenti e idempotenti:
//! 1. **Fase A (transcode)**: saltata se il `.webm` esiste già. Exit code != 0
//!    è fatale per il file: niente statistica e niente fase B.
//! 2. **Fase B (thumbnail)**: eseguita solo se il `.webp` manca, anche quando
//!    la fase A è stata saltata.
//!
//! ## Timestamp di fallback:
//! - Default: `2s → 1s → 0.5s → 0s`
//! - Clip più corte di 2s: `durata/2 → 0s`
//! - Tutti falliti: warning, il video resta senza thumbnail (non fatale)
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = VideoProcessor::new(resolver, Arc::new(FfmpegTools::new()), 8);
//! let outcome = processor.process(&source)?;
//! ```

use crate::error::PipelineError;
use crate::ffmpeg::MediaTools;
use crate::file_manager::{FileManager, SourceFile};
use crate::image_processor::{encode_webp, load_image, WEBP_QUALITY};
use crate::optimizer::path_resolver::{OutputTarget, PathResolver};
use crate::progress::{CompressionStat, TranscodeOutcome};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Timestamps tried in order when the clip length allows it
const DEFAULT_TIMESTAMPS: [f64; 4] = [2.0, 1.0, 0.5, 0.0];
/// Duration used when probing fails; never reported
const FALLBACK_DURATION: f64 = 1.0;
/// Extension of the intermediate frame grabbed by ffmpeg
const FRAME_EXTENSION: &str = "jpg";

/// Where the thumbnail fallback currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailState {
    Pending,
    Attempting(usize),
    Done(usize),
    Exhausted,
}

/// Ordered candidate timestamps consumed one attempt at a time
#[derive(Debug, Clone)]
pub struct ThumbnailPlan {
    candidates: Vec<f64>,
    state: ThumbnailState,
}

impl ThumbnailPlan {
    /// Candidates for a clip of the given duration (if known)
    pub fn for_duration(duration: Option<f64>) -> Self {
        let candidates = match duration {
            Some(d) if d > 0.0 && d < DEFAULT_TIMESTAMPS[0] => vec![d / 2.0, 0.0],
            _ => DEFAULT_TIMESTAMPS.to_vec(),
        };
        Self { candidates, state: ThumbnailState::Pending }
    }

    pub fn candidates(&self) -> &[f64] {
        &self.candidates
    }

    pub fn state(&self) -> ThumbnailState {
        self.state
    }

    /// Move to the next candidate and return its timestamp, or `None` once exhausted
    pub fn advance(&mut self) -> Option<f64> {
        let next = match self.state {
            ThumbnailState::Pending => 0,
            ThumbnailState::Attempting(i) => i + 1,
            ThumbnailState::Done(_) | ThumbnailState::Exhausted => return None,
        };
        match self.candidates.get(next) {
            Some(&timestamp) => {
                self.state = ThumbnailState::Attempting(next);
                Some(timestamp)
            }
            None => {
                self.state = ThumbnailState::Exhausted;
                None
            }
        }
    }

    /// Mark the current attempt as successful
    pub fn succeed(&mut self) {
        if let ThumbnailState::Attempting(i) = self.state {
            self.state = ThumbnailState::Done(i);
        }
    }
}

/// Render seconds the way ffmpeg's `-ss` gets them: `2`, `0.5`, `0.33`
pub fn format_timestamp(seconds: f64) -> String {
    let fixed = format!("{:.2}", seconds);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Result of the thumbnail phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    AlreadyPresent,
    Created { timestamp: String },
    /// Every candidate failed; the video is left without a thumbnail
    Exhausted { attempts: usize },
}

/// Combined result of both video phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutcome {
    pub transcode: TranscodeOutcome,
    pub thumbnail: ThumbnailOutcome,
}

/// Handles video transcoding and thumbnail extraction
#[derive(Clone)]
pub struct VideoProcessor {
    resolver: PathResolver,
    tools: Arc<dyn MediaTools>,
    encoder_threads: usize,
}

impl VideoProcessor {
    pub fn new(resolver: PathResolver, tools: Arc<dyn MediaTools>, encoder_threads: usize) -> Self {
        Self { resolver, tools, encoder_threads }
    }

    /// Run both phases for one video.
    ///
    /// A transcode failure is returned as an error and skips the thumbnail.
    /// A thumbnail failure is reported in the outcome, not as an error.
    pub fn process(&self, source: &SourceFile) -> Result<VideoOutcome, PipelineError> {
        let video = self.resolver.video_target(&source.relative_path);
        let transcode = self.transcode_phase(source, &video)?;
        let thumbnail = self.thumbnail_phase(source, &video)?;
        Ok(VideoOutcome { transcode, thumbnail })
    }

    fn transcode_phase(
        &self,
        source: &SourceFile,
        video: &OutputTarget,
    ) -> Result<TranscodeOutcome, PipelineError> {
        if video.path.exists() {
            debug!("Video already converted: {}", video.key);
            return Ok(TranscodeOutcome::AlreadyPresent);
        }

        let duration = self.tools.probe_duration(&source.absolute_path).unwrap_or_else(|e| {
            debug!("{}; assuming {}s", e, FALLBACK_DURATION);
            FALLBACK_DURATION
        });
        debug!("[Video] Starting conversion: {} ({:.1}s)", video.key, duration);

        PathResolver::ensure_parent_dirs(&video.path)?;
        let partial = FileManager::partial_path_for(&video.path)?;
        let start_time = std::time::Instant::now();
        self.tools
            .transcode(&source.absolute_path, &partial, self.encoder_threads)?;
        FileManager::commit(partial, &video.path)?;
        debug!(
            "[Video] Conversion finished: {} in {:.1}s",
            video.key,
            start_time.elapsed().as_secs_f64()
        );

        Ok(TranscodeOutcome::Converted(CompressionStat {
            original_bytes: FileManager::file_size(&source.absolute_path)?,
            converted_bytes: FileManager::file_size(&video.path)?,
            key: video.key.clone(),
        }))
    }

    fn thumbnail_phase(
        &self,
        source: &SourceFile,
        video: &OutputTarget,
    ) -> Result<ThumbnailOutcome, PipelineError> {
        let thumbnail = self.resolver.thumbnail_target(video);
        if thumbnail.path.exists() {
            debug!("Thumbnail already present: {}", thumbnail.key);
            return Ok(ThumbnailOutcome::AlreadyPresent);
        }
        PathResolver::ensure_parent_dirs(&thumbnail.path)?;

        let duration = self.tools.probe_duration(&source.absolute_path).ok();
        let mut plan = ThumbnailPlan::for_duration(duration);

        while let Some(seconds) = plan.advance() {
            let timestamp = format_timestamp(seconds);
            match self.extract_thumbnail(&source.absolute_path, &timestamp, &thumbnail.path) {
                Ok(()) => {
                    plan.succeed();
                    debug!("[Video] Thumbnail created: {} at {}s", thumbnail.key, timestamp);
                    return Ok(ThumbnailOutcome::Created { timestamp });
                }
                Err(e) => warn!(
                    "[Video] Thumbnail attempt failed for {} at {}s: {}",
                    source.relative_path.display(),
                    timestamp,
                    e
                ),
            }
        }

        let attempts = plan.candidates().len();
        warn!(
            "[Video] {}",
            PipelineError::ThumbnailFailure {
                path: source.absolute_path.clone(),
                attempts,
            }
        );
        Ok(ThumbnailOutcome::Exhausted { attempts })
    }

    /// One attempt: grab a frame into a temporary JPEG, re-encode it as WebP.
    /// The temporary frame is removed whatever the result.
    fn extract_thumbnail(&self, input: &Path, timestamp: &str, output: &Path) -> Result<(), PipelineError> {
        let frame = FileManager::partial_path_for(&output.with_extension(FRAME_EXTENSION))?;
        self.tools.extract_frame(input, timestamp, &frame)?;

        let image = load_image(&frame)?;
        let encoded = encode_webp(&image, WEBP_QUALITY)
            .map_err(|reason| PipelineError::image_codec(&*frame, reason))?;
        FileManager::write_atomic(output, &encoded)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted stand-in for ffmpeg/ffprobe
    #[derive(Default)]
    pub(crate) struct FakeTools {
        pub duration: Option<f64>,
        pub transcode_fails: bool,
        /// Timestamps at which frame extraction succeeds; `None` means all
        pub frame_ok_at: Option<Vec<&'static str>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeTools {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MediaTools for FakeTools {
        fn probe_duration(&self, input: &Path) -> Result<f64, PipelineError> {
            self.calls.lock().unwrap().push("probe".to_string());
            self.duration.ok_or_else(|| PipelineError::ProbeFailure {
                path: input.to_path_buf(),
                reason: "scripted".to_string(),
            })
        }

        fn transcode(&self, input: &Path, output: &Path, threads: usize) -> Result<(), PipelineError> {
            self.calls.lock().unwrap().push(format!("transcode:{}", threads));
            if self.transcode_fails {
                return Err(PipelineError::TranscodeFailure {
                    path: input.to_path_buf(),
                    code: Some(1),
                });
            }
            fs::write(output, b"webm bytes")?;
            Ok(())
        }

        fn extract_frame(&self, input: &Path, timestamp: &str, output: &Path) -> Result<(), PipelineError> {
            self.calls.lock().unwrap().push(format!("frame:{}", timestamp));
            let ok = self
                .frame_ok_at
                .as_ref()
                .map_or(true, |allowed| allowed.iter().any(|a| *a == timestamp));
            if !ok {
                fs::write(output, b"half a frame")?;
                return Err(PipelineError::TranscodeFailure {
                    path: input.to_path_buf(),
                    code: Some(1),
                });
            }
            RgbImage::from_pixel(400, 225, Rgb([90, 60, 30]))
                .save_with_format(output, ImageFormat::Jpeg)
                .map_err(|e| PipelineError::image_codec(output, e))?;
            Ok(())
        }
    }

    struct Fixture {
        temp: TempDir,
        source: SourceFile,
        tools: Arc<FakeTools>,
        processor: VideoProcessor,
    }

    impl Fixture {
        fn new(tools: FakeTools) -> Self {
            let temp = TempDir::new().unwrap();
            let rel = PathBuf::from("Holiday Clips/beach day.MOV");
            let abs = temp.path().join("in").join(&rel);
            fs::create_dir_all(abs.parent().unwrap()).unwrap();
            fs::write(&abs, vec![7u8; 4096]).unwrap();

            let tools = Arc::new(tools);
            let processor = VideoProcessor::new(
                PathResolver::new(temp.path().join("out")),
                tools.clone(),
                4,
            );
            Self { source: SourceFile::new(abs, rel), temp, tools, processor }
        }

        fn out(&self, name: &str) -> PathBuf {
            self.temp.path().join("out/Holiday_Clips").join(name)
        }

        fn out_dir_entries(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.temp.path().join("out/Holiday_Clips"))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    #[test]
    fn test_plan_defaults() {
        for duration in [None, Some(10.0), Some(2.0), Some(0.0), Some(-3.0)] {
            let plan = ThumbnailPlan::for_duration(duration);
            assert_eq!(plan.candidates(), &[2.0, 1.0, 0.5, 0.0], "duration {:?}", duration);
        }
    }

    #[test]
    fn test_plan_short_clip() {
        let plan = ThumbnailPlan::for_duration(Some(1.0));
        assert_eq!(plan.candidates(), &[0.5, 0.0]);
        let plan = ThumbnailPlan::for_duration(Some(1.5));
        assert_eq!(plan.candidates(), &[0.75, 0.0]);
    }

    #[test]
    fn test_plan_state_machine() {
        let mut plan = ThumbnailPlan::for_duration(Some(1.0));
        assert_eq!(plan.state(), ThumbnailState::Pending);
        assert_eq!(plan.advance(), Some(0.5));
        assert_eq!(plan.state(), ThumbnailState::Attempting(0));
        assert_eq!(plan.advance(), Some(0.0));
        assert_eq!(plan.state(), ThumbnailState::Attempting(1));
        assert_eq!(plan.advance(), None);
        assert_eq!(plan.state(), ThumbnailState::Exhausted);
        assert_eq!(plan.advance(), None);

        let mut plan = ThumbnailPlan::for_duration(None);
        plan.advance();
        plan.succeed();
        assert_eq!(plan.state(), ThumbnailState::Done(0));
        assert_eq!(plan.advance(), None);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(2.0), "2");
        assert_eq!(format_timestamp(0.5), "0.5");
        assert_eq!(format_timestamp(0.0), "0");
        assert_eq!(format_timestamp(10.0), "10");
        assert_eq!(format_timestamp(1.0 / 3.0), "0.33");
        assert_eq!(format_timestamp(0.75), "0.75");
    }

    #[test]
    fn test_ten_second_clip_thumbnail_at_two_seconds() {
        let fx = Fixture::new(FakeTools { duration: Some(10.0), ..Default::default() });

        let outcome = fx.processor.process(&fx.source).unwrap();
        match &outcome.transcode {
            TranscodeOutcome::Converted(stat) => {
                assert_eq!(stat.key, "Holiday_Clips/beach_day.webm");
                assert_eq!(stat.original_bytes, 4096);
                assert_eq!(stat.converted_bytes, 10);
            }
            other => panic!("expected conversion, got {:?}", other),
        }
        assert_eq!(outcome.thumbnail, ThumbnailOutcome::Created { timestamp: "2".into() });
        assert_eq!(fx.tools.calls(), vec!["probe", "transcode:4", "probe", "frame:2"]);

        let thumb = image::open(fx.out("beach_day.webp")).unwrap();
        assert_eq!(thumb.width(), 400);
        assert_eq!(fx.out_dir_entries(), vec!["beach_day.webm", "beach_day.webp"]);
    }

    #[test]
    fn test_one_second_clip_uses_half_duration() {
        let fx = Fixture::new(FakeTools { duration: Some(1.0), ..Default::default() });
        let outcome = fx.processor.process(&fx.source).unwrap();
        assert_eq!(outcome.thumbnail, ThumbnailOutcome::Created { timestamp: "0.5".into() });
    }

    #[test]
    fn test_thumbnail_falls_back_and_cleans_up() {
        let fx = Fixture::new(FakeTools {
            duration: Some(10.0),
            frame_ok_at: Some(vec!["0.5"]),
            ..Default::default()
        });

        let outcome = fx.processor.process(&fx.source).unwrap();
        assert_eq!(outcome.thumbnail, ThumbnailOutcome::Created { timestamp: "0.5".into() });
        let frames: Vec<String> = fx
            .tools
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("frame:"))
            .collect();
        assert_eq!(frames, vec!["frame:2", "frame:1", "frame:0.5"]);
        assert_eq!(fx.out_dir_entries(), vec!["beach_day.webm", "beach_day.webp"]);
    }

    #[test]
    fn test_all_thumbnail_attempts_fail_is_not_fatal() {
        let fx = Fixture::new(FakeTools {
            duration: None,
            frame_ok_at: Some(vec![]),
            ..Default::default()
        });

        let outcome = fx.processor.process(&fx.source).unwrap();
        assert!(matches!(outcome.transcode, TranscodeOutcome::Converted(_)));
        assert_eq!(outcome.thumbnail, ThumbnailOutcome::Exhausted { attempts: 4 });
        assert_eq!(fx.out_dir_entries(), vec!["beach_day.webm"]);
    }

    #[test]
    fn test_transcode_failure_skips_thumbnail() {
        let fx = Fixture::new(FakeTools {
            duration: Some(10.0),
            transcode_fails: true,
            ..Default::default()
        });

        let err = fx.processor.process(&fx.source).unwrap_err();
        assert!(matches!(err, PipelineError::TranscodeFailure { .. }));
        assert!(fx.tools.calls().iter().all(|c| !c.starts_with("frame:")));
        assert!(fx.out_dir_entries().is_empty());
    }

    #[test]
    fn test_existing_video_still_gets_thumbnail() {
        let fx = Fixture::new(FakeTools { duration: Some(10.0), ..Default::default() });
        fs::create_dir_all(fx.out("")).unwrap();
        fs::write(fx.out("beach_day.webm"), b"from a previous run").unwrap();

        let outcome = fx.processor.process(&fx.source).unwrap();
        assert_eq!(outcome.transcode, TranscodeOutcome::AlreadyPresent);
        assert!(matches!(outcome.thumbnail, ThumbnailOutcome::Created { .. }));
        assert!(fx.tools.calls().iter().all(|c| !c.starts_with("transcode")));
        assert_eq!(fs::read(fx.out("beach_day.webm")).unwrap(), b"from a previous run");
    }

    #[test]
    fn test_complete_video_is_untouched() {
        let fx = Fixture::new(FakeTools { duration: Some(10.0), ..Default::default() });
        fs::create_dir_all(fx.out("")).unwrap();
        fs::write(fx.out("beach_day.webm"), b"v").unwrap();
        fs::write(fx.out("beach_day.webp"), b"t").unwrap();

        let outcome = fx.processor.process(&fx.source).unwrap();
        assert_eq!(
            outcome,
            VideoOutcome {
                transcode: TranscodeOutcome::AlreadyPresent,
                thumbnail: ThumbnailOutcome::AlreadyPresent,
            }
        );
        assert!(fx.tools.calls().is_empty());
    }

    #[test]
    fn test_probe_failure_defaults_and_transcodes() {
        let fx = Fixture::new(FakeTools { duration: None, ..Default::default() });
        let outcome = fx.processor.process(&fx.source).unwrap();
        assert!(matches!(outcome.transcode, TranscodeOutcome::Converted(_)));
        assert_eq!(outcome.thumbnail, ThumbnailOutcome::Created { timestamp: "2".into() });
    }
}
