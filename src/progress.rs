//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di compressione.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - Raccolta thread-safe delle `CompressionStat` (`StatsAggregator`)
//! - Report finale con byte originali, convertiti e risparmiati
//! - Formattazione del tempo totale di esecuzione
//!
//! ## Concorrenza:
//! - L'aggregatore è creato una volta per run e passato ai worker via `Arc`
//! - Il lock è tenuto solo per l'append, mai durante la transcodifica
//!
//! ## Report finale:
//! ```text
//! Conversion Report:
//! Album/photo.webp: 2.00 MB -> 180.00 KB (saved 1.82 MB)
//!
//! Total: 2.00 MB -> 180.00 KB (saved 1.82 MB)
//! Total time: 12s 345ms
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

/// Manages progress reporting for a normalization run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that draws nothing (`--no-progress`, tests)
    pub fn hidden() -> Self {
        Self { bar: ProgressBar::hidden() }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Print a line above the bar without garbling it; logged instead when hidden
    pub fn println(&self, message: &str) {
        if self.bar.is_hidden() {
            info!("{}", message);
        } else {
            self.bar.println(message);
        }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Size figures for one successfully transcoded media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionStat {
    pub original_bytes: u64,
    pub converted_bytes: u64,
    /// Relative output key of the produced artifact
    pub key: String,
}

impl CompressionStat {
    /// `key: 1.00 MB -> 200.00 KB (saved 824.00 KB)`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} -> {} (saved {})",
            self.key,
            FileManager::format_size(self.original_bytes),
            FileManager::format_size(self.converted_bytes),
            FileManager::format_size_delta(self.original_bytes, self.converted_bytes)
        )
    }
}

/// Result of an idempotent transcode step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// Target already on disk; nothing done, nothing recorded
    AlreadyPresent,
    /// Target written; the stat must be recorded
    Converted(CompressionStat),
}

/// Append-only, lock-protected collection of `CompressionStat`
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: Mutex<Vec<CompressionStat>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one stat. The lock is held only for the push.
    pub fn record(&self, stat: CompressionStat) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stat);
    }

    /// Copy of the stats collected so far, in insertion order
    pub fn snapshot(&self) -> Vec<CompressionStat> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(original, converted)` byte totals
    pub fn totals(&self) -> (u64, u64) {
        self.snapshot().iter().fold((0, 0), |(orig, conv), stat| {
            (orig + stat.original_bytes, conv + stat.converted_bytes)
        })
    }

    /// Render the end-of-run report
    pub fn render_report(&self, elapsed: Option<Duration>) -> String {
        let stats = self.snapshot();
        let mut report = String::from("\nConversion Report:\n");
        for stat in &stats {
            let _ = writeln!(report, "{}", stat.summary());
        }

        let (original, converted) = self.totals();
        let _ = writeln!(
            report,
            "\nTotal: {} -> {} (saved {})",
            FileManager::format_size(original),
            FileManager::format_size(converted),
            FileManager::format_size_delta(original, converted)
        );
        if let Some(elapsed) = elapsed {
            let _ = writeln!(report, "Total time: {}", format_duration(elapsed));
        }
        report
    }
}

/// Largest units first: `1h 2m 3s`, `2m 0s`, `45s 120ms`.
///
/// Minutes appear when non-zero or when hours are shown; milliseconds only
/// under one minute.
pub fn format_duration(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let total_seconds = total_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = total_ms % 1000;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || hours > 0 {
        parts.push(format!("{}m", minutes));
    }
    if hours == 0 && minutes == 0 {
        parts.push(format!("{}s {}ms", seconds, millis));
    } else {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn stat(key: &str, original: u64, converted: u64) -> CompressionStat {
        CompressionStat {
            original_bytes: original,
            converted_bytes: converted,
            key: key.to_string(),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0s 0ms");
        assert_eq!(format_duration(Duration::from_millis(12_345)), "12s 345ms");
        assert_eq!(format_duration(Duration::from_millis(120_500)), "2m 0s");
        assert_eq!(format_duration(Duration::from_millis(3_723_999)), "1h 2m 3s");
        assert_eq!(format_duration(Duration::from_secs(3_605)), "1h 0m 5s");
    }

    #[test]
    fn test_concurrent_record() {
        let aggregator = Arc::new(StatsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        aggregator.record(stat(&format!("{i}/{j}.webp"), 100, 40));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(aggregator.len(), 400);
        assert_eq!(aggregator.totals(), (40_000, 16_000));
    }

    #[test]
    fn test_render_report() {
        let aggregator = StatsAggregator::new();
        aggregator.record(stat("a/one.webp", 2048, 1024));
        aggregator.record(stat("b/two.webm", 3 * 1024 * 1024, 1024 * 1024));

        let report = aggregator.render_report(Some(Duration::from_millis(1_500)));
        assert!(report.contains("Conversion Report:"));
        assert!(report.contains("a/one.webp: 2.00 KB -> 1.00 KB (saved 1.00 KB)"));
        assert!(report.contains("b/two.webm: 3.00 MB -> 1.00 MB (saved 2.00 MB)"));
        assert!(report.contains("Total: 3.00 MB -> 1.00 MB (saved 2.00 MB)"));
        assert!(report.contains("Total time: 1s 500ms"));

        let lines: Vec<&str> = report.lines().collect();
        let first = lines.iter().position(|l| l.starts_with("a/one")).unwrap();
        let second = lines.iter().position(|l| l.starts_with("b/two")).unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_report() {
        let aggregator = StatsAggregator::new();
        assert!(aggregator.is_empty());
        let report = aggregator.render_report(None);
        assert!(report.contains("Total: 0 B -> 0 B (saved 0 B)"));
        assert!(!report.contains("Total time"));
    }
}
