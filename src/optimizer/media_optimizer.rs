//! # Media Optimizer Orchestrator
//!
//! Questo è il modulo che orchestra la normalizzazione dell'intero albero.
//!
//! ## Responsabilità:
//! - Enumerazione dei file sorgente (`TreeWalker`)
//! - Worker pool a parallelismo limitato (semaforo + `spawn_blocking`)
//! - Conteggio dei risultati per file e aggiornamento della progress bar
//! - Interruzione del run se una directory di output non può essere creata
//!
//! ## Flusso di esecuzione:
//! 1. **Output root**: creata prima di tutto, il fallimento è fatale
//! 2. **Discovery**: tutti i file vengono enumerati e sottomessi subito
//! 3. **Parallel processing**: al massimo `workers` file alla volta; ogni
//!    worker resta occupato per tutta la durata dei processi esterni
//! 4. **Summary**: contatori per tipo di risultato
//!
//! ## Gestione concorrenza:
//! - Nessun ordinamento o priorità fra i file
//! - Il fallimento di un file non cancella né rallenta gli altri
//! - L'unico stato condiviso è lo `StatsAggregator` (append sotto lock)
//!
//! ## Esempio:
//! ```rust,ignore
//! let optimizer = MediaOptimizer::new(config, Arc::new(FfmpegTools::new()));
//! let summary = optimizer.run().await?;
//! println!("{}", optimizer.stats().render_report(Some(summary.elapsed)));
//! ```

use crate::{
    config::Config,
    error::PipelineError,
    ffmpeg::MediaTools,
    file_manager::{SourceFile, TreeWalker},
    optimizer::{
        path_resolver::PathResolver,
        task_optimizer::{FileOutcome, TaskOptimizer},
    },
    progress::{ProgressManager, StatsAggregator, TranscodeOutcome},
    video_processor::{ThumbnailOutcome, VideoProcessor},
};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub converted: usize,
    pub already_present: usize,
    pub copied: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub thumbnails_created: usize,
    pub thumbnails_missing: usize,
    /// A directory could not be created; remaining files were not started
    pub aborted: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    fn tally(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Image(transcode) => self.tally_transcode(transcode),
            FileOutcome::Video(video) => {
                self.tally_transcode(&video.transcode);
                match video.thumbnail {
                    ThumbnailOutcome::Created { .. } => self.thumbnails_created += 1,
                    ThumbnailOutcome::Exhausted { .. } => self.thumbnails_missing += 1,
                    ThumbnailOutcome::AlreadyPresent => {}
                }
            }
            FileOutcome::Copied => self.copied += 1,
            FileOutcome::Failed { fatal, .. } => {
                self.failed += 1;
                self.aborted |= *fatal;
            }
            FileOutcome::Cancelled => self.cancelled += 1,
        }
    }

    fn tally_transcode(&mut self, outcome: &TranscodeOutcome) {
        match outcome {
            TranscodeOutcome::Converted(_) => self.converted += 1,
            TranscodeOutcome::AlreadyPresent => self.already_present += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.converted + self.already_present + self.copied + self.failed + self.cancelled
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Converted: {} | Already present: {} | Copied: {} | Failed: {} | Thumbnails: {} created, {} missing",
            self.converted,
            self.already_present,
            self.copied,
            self.failed,
            self.thumbnails_created,
            self.thumbnails_missing
        )
    }
}

/// Main normalization orchestrator
pub struct MediaOptimizer {
    config: Arc<Config>,
    task: Arc<TaskOptimizer>,
    stats: Arc<StatsAggregator>,
    show_progress: bool,
}

impl MediaOptimizer {
    /// Create an optimizer; the stats aggregator lives as long as this value
    pub fn new(config: Config, tools: Arc<dyn MediaTools>) -> Self {
        let resolver = PathResolver::new(&config.output_root);
        let stats = Arc::new(StatsAggregator::new());
        let video = VideoProcessor::new(resolver.clone(), tools, config.encoder_threads);
        let task = TaskOptimizer::new(resolver, video, Arc::clone(&stats));
        Self {
            config: Arc::new(config),
            task: Arc::new(task),
            stats,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Run the whole batch
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();
        info!("Starting normalization: {} -> {}", self.config.input_root.display(), self.config.output_root.display());

        std::fs::create_dir_all(&self.config.output_root)
            .map_err(|source| PipelineError::DirectoryCreationFailure {
                path: self.config.output_root.clone(),
                source,
            })
            .context("Output root is unusable")?;

        let files: Vec<SourceFile> = TreeWalker::new(&self.config.input_root).iter().collect();
        info!("Found {} files to process with {} workers", files.len(), self.config.workers);

        let progress = if self.show_progress {
            ProgressManager::new(files.len() as u64)
        } else {
            ProgressManager::hidden()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let aborted = Arc::new(AtomicBool::new(false));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|file| {
                let semaphore = Arc::clone(&semaphore);
                let aborted = Arc::clone(&aborted);
                let task = Arc::clone(&self.task);
                let progress = progress.clone();

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await?;
                    let label = file.relative_path.display().to_string();

                    let outcome = if aborted.load(Ordering::SeqCst) {
                        FileOutcome::Cancelled
                    } else {
                        let outcome = tokio::task::spawn_blocking(move || task.process_file(&file)).await?;
                        if matches!(outcome, FileOutcome::Failed { fatal: true, .. }) {
                            aborted.store(true, Ordering::SeqCst);
                        }
                        outcome
                    };

                    if let Some(line) = outcome.stat_line() {
                        progress.println(&line);
                    }
                    progress.update(&format!("{} {}", outcome.status(), label));
                    Ok::<_, anyhow::Error>(outcome)
                })
            })
            .collect();

        let mut summary = RunSummary::default();
        for result in join_all(tasks).await {
            match result {
                Ok(Ok(outcome)) => summary.tally(&outcome),
                Ok(Err(e)) => {
                    error!("Worker failed: {}", e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Worker panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        summary.elapsed = start_time.elapsed();
        progress.finish(&summary.format_summary());

        if summary.aborted {
            warn!("Run aborted after a directory creation failure; {} files not started", summary.cancelled);
        }
        info!("=== Normalization Complete ===");
        info!("{}", summary.format_summary());
        Ok(summary)
    }
}
