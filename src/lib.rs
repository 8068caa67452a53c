//! # Media Normalizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione del run e validazione parametri
//! - `error`: Tipi di errore per probe, transcodifica, codec e filesystem
//! - `file_manager`: Discovery dei file sorgente e scritture atomiche
//! - `image_processor`: Immagini → WebP 900px
//! - `video_processor`: Video → WebM AV1/Opus + thumbnail WebP
//! - `ffmpeg`: Confine verso ffmpeg/ffprobe (trait `MediaTools`)
//! - `optimizer`: Orchestratore, worker per file e path di output
//! - `manifest`: Manifest CSV generato dall'albero di output
//! - `progress`: Progress bar, statistiche di compressione e report
//! - `platform`: Rilevamento dei tool esterni
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use media_normalizer::{Config, FfmpegTools, ManifestBuilder, MediaOptimizer};
//! use std::sync::Arc;
//!
//! let config = Config::new("~/Pictures/site", "~/site-compressed");
//! config.validate()?;
//! let optimizer = MediaOptimizer::new(config.clone(), Arc::new(FfmpegTools::new()));
//! let summary = optimizer.run().await?;
//! ManifestBuilder::from_config(&config).write()?;
//! ```

pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod file_manager;
pub mod image_processor;
pub mod manifest;
pub mod optimizer;
pub mod platform;
pub mod progress;
pub mod utils;
pub mod video_processor;

pub use config::Config;
pub use error::PipelineError;
pub use ffmpeg::{FfmpegTools, MediaTools};
pub use manifest::{ManifestBuilder, ManifestRow};
pub use optimizer::{MediaOptimizer, RunSummary};
pub use progress::StatsAggregator;
