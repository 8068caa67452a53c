//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//! Transcoder e manifest passano da qui: la sanitizzazione applicata quando
//! un artefatto viene scritto è la stessa usata per calcolare la sua chiave.

use crate::error::PipelineError;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Characters removed from every output path
const FORBIDDEN_CHARS: [char; 8] = ['+', '?', '<', '>', ':', '"', '|', '*'];

/// Extension of transcoded images and video thumbnails
pub const IMAGE_OUTPUT_EXTENSION: &str = "webp";
/// Extension of transcoded videos
pub const VIDEO_OUTPUT_EXTENSION: &str = "webm";

/// Strip characters unsafe for filesystems and object-store keys.
///
/// Deletes `+ ? < > : " | *` and turns spaces into underscores. Applied to
/// the whole string, so every segment of a path is cleaned. Idempotent.
pub fn sanitize_path(path: &str) -> String {
    path.chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Forward-slash rendering of a relative path, independent of the host separator
pub fn posix_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// An output artifact location: its manifest key and its absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub key: String,
    pub path: PathBuf,
}

/// Utility per calcolare i path di output in modo centralizzato
#[derive(Debug, Clone)]
pub struct PathResolver {
    output_root: PathBuf,
}

impl PathResolver {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self { output_root: output_root.into() }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Sanitized key for a source-relative path, optionally swapping the extension
    pub fn output_key(relative: &Path, extension: Option<&str>) -> String {
        let relative = match extension {
            Some(ext) => relative.with_extension(ext),
            None => relative.to_path_buf(),
        };
        sanitize_path(&posix_key(&relative))
    }

    /// Absolute location of a key under the output root
    pub fn resolve_key(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.output_root.clone(), |acc, part| acc.join(part))
    }

    fn target(&self, key: String) -> OutputTarget {
        let path = self.resolve_key(&key);
        debug!("Resolved output path: {} -> {}", key, path.display());
        OutputTarget { key, path }
    }

    /// Target of a transcoded image
    pub fn image_target(&self, relative: &Path) -> OutputTarget {
        self.target(Self::output_key(relative, Some(IMAGE_OUTPUT_EXTENSION)))
    }

    /// Target of a transcoded video
    pub fn video_target(&self, relative: &Path) -> OutputTarget {
        self.target(Self::output_key(relative, Some(VIDEO_OUTPUT_EXTENSION)))
    }

    /// Thumbnail next to a transcoded video: same base name, still-image extension
    pub fn thumbnail_target(&self, video: &OutputTarget) -> OutputTarget {
        let key = Path::new(&video.key).with_extension(IMAGE_OUTPUT_EXTENSION);
        self.target(posix_key(&key))
    }

    /// Mirrored location of a file copied as-is
    pub fn passthrough_target(&self, relative: &Path) -> OutputTarget {
        self.target(Self::output_key(relative, None))
    }

    /// Create the parent directories of `path` if needed.
    ///
    /// Safe to call from several workers at once: a directory created
    /// concurrently by a sibling task is not an error.
    pub fn ensure_parent_dirs(path: &Path) -> Result<(), PipelineError> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match std::fs::create_dir_all(parent) {
            Ok(()) => Ok(()),
            Err(_) if parent.is_dir() => Ok(()),
            Err(source) => Err(PipelineError::DirectoryCreationFailure {
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}
