//! # Task Optimizer Module
//!
//! Worker per la normalizzazione di singoli file.
//! Classifica il file, lo passa al processor giusto e converte ogni errore in
//! un `FileOutcome::Failed` loggato: nessun errore esce dal task.
//!
//! I sorgenti il cui nome inizia con `.partial-` vengono rifiutati: il prefisso
//! è riservato ai file temporanei e il manifest li ignora.

use crate::{
    error::PipelineError,
    file_manager::{FileManager, MediaKind, SourceFile},
    image_processor::ImageProcessor,
    optimizer::path_resolver::PathResolver,
    progress::{StatsAggregator, TranscodeOutcome},
    video_processor::{ThumbnailOutcome, VideoOutcome, VideoProcessor},
};
use std::sync::Arc;
use tracing::{debug, error};

/// What happened to one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Image(TranscodeOutcome),
    Video(VideoOutcome),
    Copied,
    Failed { kind: MediaKind, fatal: bool },
    /// Never started because the run was aborted
    Cancelled,
}

impl FileOutcome {
    /// Short status used by the progress bar
    pub fn status(&self) -> &'static str {
        match self {
            FileOutcome::Image(TranscodeOutcome::Converted(_))
            | FileOutcome::Video(VideoOutcome { transcode: TranscodeOutcome::Converted(_), .. }) => "✅ converted",
            FileOutcome::Video(VideoOutcome { thumbnail: ThumbnailOutcome::Created { .. }, .. }) => "🖼️ thumbnail",
            FileOutcome::Image(_) | FileOutcome::Video(_) => "⏩ already present",
            FileOutcome::Copied => "📄 copied",
            FileOutcome::Failed { .. } => "❌ error",
            FileOutcome::Cancelled => "⛔ cancelled",
        }
    }

    /// Compression line for a file converted in this run, if any
    pub fn stat_line(&self) -> Option<String> {
        match self {
            FileOutcome::Image(TranscodeOutcome::Converted(stat)) => Some(format!("[Image] {}", stat.summary())),
            FileOutcome::Video(VideoOutcome { transcode: TranscodeOutcome::Converted(stat), .. }) => {
                Some(format!("[Video] {}", stat.summary()))
            }
            _ => None,
        }
    }
}

/// Worker per elaborazione singoli file
pub struct TaskOptimizer {
    resolver: PathResolver,
    image_processor: ImageProcessor,
    video_processor: VideoProcessor,
    stats: Arc<StatsAggregator>,
}

impl TaskOptimizer {
    pub fn new(
        resolver: PathResolver,
        video_processor: VideoProcessor,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            image_processor: ImageProcessor::new(resolver.clone()),
            resolver,
            video_processor,
            stats,
        }
    }

    /// Processa un singolo file: classify, dispatch, record
    pub fn process_file(&self, source: &SourceFile) -> FileOutcome {
        let kind = source.kind();
        debug!("Processing {:?}: {}", kind, source.relative_path.display());

        let reserved = source
            .relative_path
            .file_name()
            .is_some_and(|name| FileManager::is_partial(&name.to_string_lossy()));

        let result = match kind {
            _ if reserved => Err(PipelineError::ReservedName {
                path: source.relative_path.clone(),
            }),
            MediaKind::Image => self.image_processor.process(source).map(|outcome| {
                self.record("Image", &outcome);
                FileOutcome::Image(outcome)
            }),
            MediaKind::Video => self.video_processor.process(source).map(|outcome| {
                self.record("Video", &outcome.transcode);
                FileOutcome::Video(outcome)
            }),
            MediaKind::Passthrough => self.copy(source).map(|()| FileOutcome::Copied),
        };

        result.unwrap_or_else(|e| {
            let fatal = matches!(e, PipelineError::DirectoryCreationFailure { .. });
            error!("[{:?}] Failed to process {}: {}", kind, source.relative_path.display(), e);
            FileOutcome::Failed { kind, fatal }
        })
    }

    fn record(&self, label: &str, outcome: &TranscodeOutcome) {
        if let TranscodeOutcome::Converted(stat) = outcome {
            debug!("[{}] {}", label, stat.summary());
            self.stats.record(stat.clone());
        }
    }

    /// Unconditional copy: no existence check, always re-executed
    fn copy(&self, source: &SourceFile) -> Result<(), PipelineError> {
        let target = self.resolver.passthrough_target(&source.relative_path);
        PathResolver::ensure_parent_dirs(&target.path)?;
        FileManager::copy_preserving(&source.absolute_path, &target.path)?;
        debug!("[Copy] {}", target.key);
        Ok(())
    }
}
