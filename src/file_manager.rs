//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery dei sorgenti.
//!
//! ## Responsabilità:
//! - Enumerazione lazy e ricorsiva dell'albero sorgente (`TreeWalker`)
//! - Classificazione per estensione (immagine, video, passthrough)
//! - Copia passthrough che preserva permessi e timestamp (anche per sorgenti read-only)
//! - Scritture atomiche via file `.partial-*` con permessi `0644` (umask applicata)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati riconosciuti:
//! - **Immagini**: JPG, JPEG, PNG, WebP, GIF, TIFF, BMP
//! - **Video**: MOV, MP4
//! - Tutto il resto viene copiato così com'è (AVIF incluso: nessun decoder)
//!
//! ## Symlink:
//! - I link simbolici non vengono seguiti né copiati (log a livello debug)
//!
//! ## Esempio:
//! ```rust,ignore
//! let walker = TreeWalker::new("/path/to/media");
//! for file in walker.iter() {
//!     match file.kind() {
//!         MediaKind::Image => { /* transcode */ }
//!         _ => {}
//!     }
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Prefix of in-flight artifacts; renamed into place once complete
pub const PARTIAL_PREFIX: &str = ".partial-";

/// Mode of committed artifacts before the umask, matching a plain `File::create`
#[cfg(unix)]
const ARTIFACT_MODE: u32 = 0o644;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "tiff", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4"];

/// Handling strategy for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Passthrough,
}

impl MediaKind {
    /// Classify by extension (case-insensitive). Total: unknown means passthrough.
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Passthrough
        }
    }
}

/// A regular file discovered under the input root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
    pub extension: String,
}

impl SourceFile {
    pub fn new(absolute_path: PathBuf, relative_path: PathBuf) -> Self {
        let extension = relative_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { absolute_path, relative_path, extension }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_extension(&self.extension)
    }
}

/// Depth-first enumeration of every regular file below a root.
///
/// `iter()` can be called any number of times; each call starts a fresh walk.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield `SourceFile`s in sorted depth-first order
    pub fn iter(&self) -> impl Iterator<Item = SourceFile> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter_map(move |entry| {
                let file_type = entry.file_type();
                if file_type.is_symlink() {
                    debug!("Skipping symlink: {}", entry.path().display());
                    return None;
                }
                if !file_type.is_file() {
                    return None;
                }
                let relative = entry.path().strip_prefix(&self.root).ok()?.to_path_buf();
                Some(SourceFile::new(entry.into_path(), relative))
            })
    }
}

/// Manages file operations
pub struct FileManager;

impl FileManager {
    /// Size of a file in bytes
    pub fn file_size(path: &Path) -> std::io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    /// Copy bytes, permissions and access/modification times.
    ///
    /// Always overwrites the destination. The copy lands in a `.partial-`
    /// sibling first, so a read-only destination from a previous run is
    /// replaced by the rename instead of being reopened for writing.
    pub fn copy_preserving(source: &Path, destination: &Path) -> std::io::Result<u64> {
        let partial = Self::partial_path_for(destination)?;
        let copied = fs::copy(source, &partial)?;
        let metadata = fs::metadata(source)?;

        let mut times = fs::FileTimes::new();
        if let Ok(modified) = metadata.modified() {
            times = times.set_modified(modified);
        }
        if let Ok(accessed) = metadata.accessed() {
            times = times.set_accessed(accessed);
        }
        times_handle(&partial)?.set_times(times)?;

        Self::commit(partial, destination)?;
        Ok(copied)
    }

    /// Reserve a hidden temporary file next to `target`, keeping its extension
    /// so encoders that sniff the output format still pick the right muxer.
    pub fn partial_path_for(target: &Path) -> std::io::Result<TempPath> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let suffix = target
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix(PARTIAL_PREFIX).suffix(&suffix);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(ARTIFACT_MODE));
        }
        Ok(builder.tempfile_in(dir)?.into_temp_path())
    }

    /// Move a finished temporary file onto `target`
    pub fn commit(partial: TempPath, target: &Path) -> std::io::Result<()> {
        partial.persist(target).map_err(|e| e.error)
    }

    /// Write `bytes` to `target` through a temporary sibling and a rename,
    /// so a reader never sees a truncated file.
    pub fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let partial = Self::partial_path_for(target)?;
        {
            let mut file = fs::File::create(&partial)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        Self::commit(partial, target)
    }

    /// Whether a file name is an in-flight artifact left by an interrupted run
    pub fn is_partial(name: &str) -> bool {
        name.starts_with(PARTIAL_PREFIX)
    }

    /// Get human-readable file size (binary units, two decimals)
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
        let mut value = size as f64;
        let mut unit_index = 0;

        while value >= 1024.0 && unit_index < UNITS.len() - 1 {
            value /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size, UNITS[0])
        } else {
            format!("{:.2} {}", value, UNITS[unit_index])
        }
    }

    /// Signed variant used for "saved" figures, which go negative when output grows
    pub fn format_size_delta(original: u64, converted: u64) -> String {
        if converted > original {
            format!("-{}", Self::format_size(converted - original))
        } else {
            Self::format_size(original - converted)
        }
    }
}

/// Handle that can change timestamps without write access to the contents
#[cfg(not(windows))]
fn times_handle(path: &Path) -> std::io::Result<fs::File> {
    fs::File::open(path)
}

#[cfg(windows)]
fn times_handle(path: &Path) -> std::io::Result<fs::File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    fs::OpenOptions::new().access_mode(FILE_WRITE_ATTRIBUTES).open(path)
}
