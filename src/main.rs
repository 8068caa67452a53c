//! # Media Normalizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione e validazione della configurazione
//! - Avvio della normalizzazione e generazione del manifest
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, output, workers, modalità)
//! 2. Configura il logging (`RUST_LOG`, oppure INFO/DEBUG col flag verbose)
//! 3. Costruisce e valida un oggetto `Config`
//! 4. Controlla la presenza di ffmpeg/ffprobe (solo warning)
//! 5. Esegue il `MediaOptimizer` e stampa il report di conversione
//! 6. Riscandisce l'output e scrive `content.csv`
//! 7. Exit code non-zero se almeno un file è fallito
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-normalizer --input ~/Downloads/Content --output ~/Downloads/Converted --workers 8
//! CONTENT_INPUT_DIR=~/in COMPRESSION_OUTPUT_DIR=~/out media-normalizer --manifest-only
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use media_normalizer::{platform::PlatformCommands, Config, FfmpegTools, ManifestBuilder, MediaOptimizer};

#[derive(Parser)]
#[command(name = "media-normalizer")]
#[command(about = "Normalize a media tree into WebP/WebM artifacts and a CSV manifest")]
struct Args {
    /// Directory containing the source media tree
    #[arg(short, long, env = "CONTENT_INPUT_DIR")]
    input: Option<PathBuf>,

    /// Directory receiving the normalized tree and the manifest
    #[arg(short, long, env = "COMPRESSION_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// JSON configuration file; command line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel workers (default: CPU cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip conversion, only rescan the output and rewrite the manifest
    #[arg(long, conflicts_with = "skip_manifest")]
    manifest_only: bool,

    /// Do not write the manifest after converting
    #[arg(long)]
    skip_manifest: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over the verbose flag
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    match (&args.input, &args.output) {
        (Some(input), Some(output)) => {
            let roots = Config::new(input, output);
            config.input_root = roots.input_root;
            config.output_root = roots.output_root;
        }
        (None, None) if args.config.is_some() => {}
        _ => bail!("Both --input and --output are required unless --config provides them"),
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;
    debug!("Platform: {}", PlatformCommands::system_info());
    debug!("Config: {:?}", config);

    let mut failed = 0;
    let mut aborted = false;

    if !args.manifest_only {
        PlatformCommands::report_dependencies();

        let start_time = Instant::now();
        let optimizer = MediaOptimizer::new(config.clone(), Arc::new(FfmpegTools::new()))
            .with_progress(!args.no_progress);
        let summary = optimizer.run().await?;

        println!("{}", optimizer.stats().render_report(Some(start_time.elapsed())));
        println!("{}", summary.format_summary());
        failed = summary.failed;
        aborted = summary.aborted;
    }

    if !args.skip_manifest && !aborted {
        let rows = ManifestBuilder::from_config(&config)
            .write()
            .with_context(|| format!("Failed to write manifest {}", config.manifest_path().display()))?;
        info!("📄 Manifest: {} ({} entries)", config.manifest_path().display(), rows);
    }

    if aborted {
        bail!("Run aborted: an output directory could not be created ({} files failed)", failed);
    }
    if failed > 0 {
        bail!("{} files failed to normalize", failed);
    }
    Ok(())
}
