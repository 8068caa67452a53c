//! # Manifest Module
//!
//! Genera il manifest CSV riscandendo l'albero di output, non le statistiche
//! in memoria: il manifest riflette lo stato reale del filesystem anche dopo
//! run parziali o ripresi.
//!
//! ## Colonne:
//! `name,key,set,size,mimeType,date,tags`
//! - `name`: nome file senza estensione
//! - `key`: path relativo alla root di output, con `/`
//! - `set`: primo segmento del path con `_` mostrati come spazi
//!   (i file nella root usano il proprio nome)
//! - `size`: dimensione in byte
//! - `mimeType`: dedotto dall'estensione, `application/octet-stream` se ignoto
//! - `date`: data di modifica ISO-8601 (ora locale)
//! - `tags`: vuoto, riservato alla cura manuale
//!
//! Il manifest stesso e i file temporanei `.partial-*` non compaiono mai.

use crate::config::Config;
use crate::error::PipelineError;
use crate::file_manager::{FileManager, TreeWalker};
use crate::optimizer::path_resolver::{posix_key, sanitize_path};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Header of the manifest, in column order
pub const MANIFEST_HEADER: [&str; 7] = ["name", "key", "set", "size", "mimeType", "date", "tags"];

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One artifact in the output tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    pub name: String,
    pub key: String,
    pub set: String,
    pub size: u64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub date: String,
    pub tags: String,
}

/// Rescans an output tree and writes its CSV manifest
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    output_root: PathBuf,
    manifest_name: String,
}

impl ManifestBuilder {
    pub fn new(output_root: impl Into<PathBuf>, manifest_name: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            manifest_name: manifest_name.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.output_root, &config.manifest_name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_root.join(&self.manifest_name)
    }

    /// Build one row per file currently in the output tree
    pub fn scan(&self) -> Result<Vec<ManifestRow>, PipelineError> {
        let mut rows = Vec::new();
        for file in TreeWalker::new(&self.output_root).iter() {
            let key = posix_key(&file.relative_path);
            if key == self.manifest_name {
                continue;
            }
            let file_name = file
                .absolute_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if FileManager::is_partial(&file_name) {
                warn!("Ignoring leftover partial file: {}", key);
                continue;
            }
            if sanitize_path(&key) != key {
                warn!("Key {:?} was not produced by the normalizer and is not upload-safe", key);
            }

            let metadata = std::fs::metadata(&file.absolute_path)?;
            rows.push(ManifestRow {
                name: file_stem(&file.absolute_path),
                set: set_name(&key),
                size: metadata.len(),
                mime_type: mime_type(&file.absolute_path),
                date: format_date(metadata.modified()?),
                tags: String::new(),
                key,
            });
        }
        Ok(rows)
    }

    /// Rescan and atomically (re)write the manifest; returns the row count
    pub fn write(&self) -> Result<usize, PipelineError> {
        let rows = self.scan()?;
        let bytes = render_csv(&rows)?;
        FileManager::write_atomic(&self.manifest_path(), &bytes)?;
        info!("Wrote {} with {} entries.", self.manifest_name, rows.len());
        Ok(rows.len())
    }
}

/// Serialize rows under the fixed header; the header is written even with no rows
pub fn render_csv(rows: &[ManifestRow]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(MANIFEST_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))
}

/// Display set: first path segment with underscores shown as spaces
pub fn set_name(key: &str) -> String {
    let first = key.split_once('/').map_or(key, |(head, _)| head);
    first.replace('_', " ")
}

/// Best-effort content type from the extension
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn format_date(modified: std::time::SystemTime) -> String {
    DateTime::<Local>::from(modified)
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::fs;
    use tempfile::TempDir;

    fn output_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("Summer_Trip/day_1")).unwrap();
        fs::write(root.join("Summer_Trip/day_1/wide_shot.webp"), vec![1u8; 10]).unwrap();
        fs::write(root.join("Summer_Trip/clip.webm"), vec![2u8; 20]).unwrap();
        fs::write(root.join("Summer_Trip/clip.webp"), vec![3u8; 5]).unwrap();
        fs::write(root.join("readme.txt"), b"hello").unwrap();
        fs::write(root.join("data.zzqq"), b"?").unwrap();
        temp
    }

    #[test]
    fn test_rows_describe_output_tree() {
        let temp = output_tree();
        let rows = ManifestBuilder::new(temp.path(), "content.csv").scan().unwrap();
        assert_eq!(rows.len(), 5);

        let wide = rows.iter().find(|r| r.key == "Summer_Trip/day_1/wide_shot.webp").unwrap();
        assert_eq!(wide.name, "wide_shot");
        assert_eq!(wide.set, "Summer Trip");
        assert_eq!(wide.size, 10);
        assert_eq!(wide.mime_type, "image/webp");
        assert_eq!(wide.tags, "");
        assert!(NaiveDateTime::parse_from_str(&wide.date, "%Y-%m-%dT%H:%M:%S%.f").is_ok());

        let clip = rows.iter().find(|r| r.key == "Summer_Trip/clip.webm").unwrap();
        assert_eq!(clip.mime_type, "video/webm");

        let readme = rows.iter().find(|r| r.key == "readme.txt").unwrap();
        assert_eq!(readme.set, "readme.txt");
        assert_eq!(readme.mime_type, "text/plain");

        let unknown = rows.iter().find(|r| r.key == "data.zzqq").unwrap();
        assert_eq!(unknown.mime_type, "application/octet-stream");
    }

    #[test]
    fn test_manifest_excludes_itself_and_partials() {
        let temp = output_tree();
        fs::write(temp.path().join("Summer_Trip/.partial-abc123.webm"), b"crashed").unwrap();
        let builder = ManifestBuilder::new(temp.path(), "content.csv");

        assert_eq!(builder.write().unwrap(), 5);
        // Rewriting with the manifest present must not count it
        assert_eq!(builder.write().unwrap(), 5);

        let file_count = walkdir::WalkDir::new(temp.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| !e.file_name().to_string_lossy().starts_with(".partial-"))
            .count();

        let mut reader = csv::Reader::from_path(builder.manifest_path()).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, MANIFEST_HEADER);
        assert_eq!(reader.records().count(), file_count - 1);
    }

    #[test]
    fn test_empty_tree_still_has_header() {
        let temp = TempDir::new().unwrap();
        let builder = ManifestBuilder::new(temp.path(), "content.csv");
        assert_eq!(builder.write().unwrap(), 0);
        let content = fs::read_to_string(builder.manifest_path()).unwrap();
        assert_eq!(content.trim_end(), "name,key,set,size,mimeType,date,tags");
    }

    #[test]
    fn test_render_csv_quotes_fields() {
        let row = ManifestRow {
            name: "a,b".into(),
            key: "set/a,b.webp".into(),
            set: "set".into(),
            size: 3,
            mime_type: "image/webp".into(),
            date: "2024-01-01T00:00:00.000000".into(),
            tags: String::new(),
        };
        let text = String::from_utf8(render_csv(&[row]).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("name,key,set,size,mimeType,date,tags"));
        assert_eq!(
            lines.next(),
            Some("\"a,b\",\"set/a,b.webp\",set,3,image/webp,2024-01-01T00:00:00.000000,")
        );
    }

    #[test]
    fn test_set_name() {
        assert_eq!(set_name("My_Album/x/y.webp"), "My Album");
        assert_eq!(set_name("root_file.webp"), "root file.webp");
    }
}
