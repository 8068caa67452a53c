//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con le root di input/output e il parallelismo
//! - Fornisce validazione dei parametri prima dell'avvio
//! - Espande `~` nelle root come farebbe una shell
//! - Fornisce valori di default sensati (worker = core disponibili)
//!
//! ## Parametri di configurazione:
//! - `input_root`: Directory sorgente da normalizzare
//! - `output_root`: Directory di output (struttura speculare, path sanitizzati)
//! - `workers`: Numero di worker paralleli (default: numero di core)
//! - `encoder_threads`: Thread passati a ffmpeg (default: numero di core)
//! - `manifest_name`: Nome del manifest CSV nella root di output (default: `content.csv`)
//!
//! Può essere letta/salvata come JSON (`--config`); i flag CLI hanno la precedenza.
//!
//! La configurazione viene costruita una volta in `main` e passata esplicitamente
//! ai componenti: nessun modulo legge variabili d'ambiente.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     workers: 8,
//!     ..Config::new("~/Downloads/Content", "~/Downloads/Converted")
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default manifest file name, written at the output root
pub const DEFAULT_MANIFEST_NAME: &str = "content.csv";

/// Fallback pool size when core detection reports nothing usable
const FALLBACK_WORKERS: usize = 4;

/// Configuration for one normalization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source tree to normalize
    pub input_root: PathBuf,
    /// Destination tree (mirrors the source with sanitized paths)
    pub output_root: PathBuf,
    /// Number of parallel workers
    pub workers: usize,
    /// Thread count handed to the video encoder
    pub encoder_threads: usize,
    /// Manifest file name inside `output_root`
    pub manifest_name: String,
}

impl Default for Config {
    fn default() -> Self {
        let cores = available_cores();
        Self {
            input_root: PathBuf::from("."),
            output_root: PathBuf::from("output"),
            workers: cores,
            encoder_threads: cores,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl Config {
    /// Create a configuration for the given roots, expanding a leading `~`
    pub fn new(input_root: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Self {
        Self {
            input_root: expand_home(input_root.as_ref()),
            output_root: expand_home(output_root.as_ref()),
            ..Default::default()
        }
    }

    /// Absolute path of the manifest file
    pub fn manifest_path(&self) -> PathBuf {
        self.output_root.join(&self.manifest_name)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.input_root.exists() {
            return Err(anyhow::anyhow!("Input directory does not exist: {}", self.input_root.display()));
        }
        if !self.input_root.is_dir() {
            return Err(anyhow::anyhow!("Input path is not a directory: {}", self.input_root.display()));
        }
        if self.output_root.exists() && !self.output_root.is_dir() {
            return Err(anyhow::anyhow!("Output path is not a directory: {}", self.output_root.display()));
        }
        if self.input_root == self.output_root {
            return Err(anyhow::anyhow!("Input and output directories must differ"));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }
        if self.encoder_threads == 0 {
            return Err(anyhow::anyhow!("Number of encoder threads must be greater than 0"));
        }

        if self.manifest_name.is_empty() || self.manifest_name.contains(['/', '\\']) {
            return Err(anyhow::anyhow!("Invalid manifest name: {:?}", self.manifest_name));
        }

        Ok(())
    }

    /// Load configuration from a JSON file; a missing file yields the defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.input_root = expand_home(&config.input_root);
        config.output_root = expand_home(&config.output_root);
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Number of usable CPU cores, never zero
pub fn available_cores() -> usize {
    match num_cpus::get() {
        0 => FALLBACK_WORKERS,
        n => n,
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::new(temp_dir.path(), temp_dir.path().join("out"));
        assert!(config.validate().is_ok());

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 2;
        config.encoder_threads = 0;
        assert!(config.validate().is_err());

        config.encoder_threads = 2;
        config.manifest_name = "nested/content.csv".to_string();
        assert!(config.validate().is_err());

        config.manifest_name = DEFAULT_MANIFEST_NAME.to_string();
        config.output_root = config.input_root.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_input_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(temp_dir.path().join("missing"), temp_dir.path().join("out"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.workers >= 1);
        assert_eq!(config.workers, config.encoder_threads);
        assert_eq!(config.manifest_name, "content.csv");
    }

    #[tokio::test]
    async fn test_config_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("normalizer.json");

        let missing = Config::from_file(&path).await.unwrap();
        assert_eq!(missing.manifest_name, DEFAULT_MANIFEST_NAME);

        let mut config = Config::new(temp_dir.path(), temp_dir.path().join("out"));
        config.workers = 3;
        config.manifest_name = "index.csv".to_string();
        config.save_to_file(&path).await.unwrap();

        let loaded = Config::from_file(&path).await.unwrap();
        assert_eq!(loaded.workers, 3);
        assert_eq!(loaded.manifest_name, "index.csv");
        assert_eq!(loaded.output_root, temp_dir.path().join("out"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/Content")), home.join("Content"));
        }
    }
}
