//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `PipelineError` per categorizzare i fallimenti per-file
//! - Fornisce messaggi di errore descrittivi con il path coinvolto
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `ProbeFailure`: ffprobe fallito o durata non positiva (non fatale)
//! - `TranscodeFailure`: ffmpeg uscito con codice != 0 (fatale per il video)
//! - `ThumbnailFailure`: tutti i timestamp di fallback esauriti
//! - `ImageCodecFailure`: decode/encode immagine fallito
//! - `DirectoryCreationFailure`: impossibile creare la directory di output
//! - `MissingDependency`: tool esterno mancante (ffmpeg, ffprobe)
//! - `ReservedName`: sorgente con il prefisso `.partial-` riservato ai file temporanei
//! - `Io` / `Manifest`: errori di I/O e di scrittura CSV
//!
//! ## Esempio:
//! ```rust,ignore
//! if !status.success() {
//!     return Err(PipelineError::TranscodeFailure { path, code: status.code() });
//! }
//! ```

use std::path::PathBuf;

/// Errors raised while normalizing a single file or writing the manifest
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Duration probe failed for {path}: {reason}")]
    ProbeFailure { path: PathBuf, reason: String },

    #[error("Transcode failed for {path} (exit code {code:?})")]
    TranscodeFailure { path: PathBuf, code: Option<i32> },

    #[error("Thumbnail extraction failed for {path} after {attempts} attempts")]
    ThumbnailFailure { path: PathBuf, attempts: usize },

    #[error("Image codec error for {path}: {reason}")]
    ImageCodecFailure { path: PathBuf, reason: String },

    #[error("Cannot create output directory {path}: {source}")]
    DirectoryCreationFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Source name uses the reserved temporary-file prefix: {path}")]
    ReservedName { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] csv::Error),
}

impl PipelineError {
    /// Build an `ImageCodecFailure` from anything printable
    pub fn image_codec(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::ImageCodecFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
