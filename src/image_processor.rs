//! # Image Processing Module
//!
//! Questo modulo converte ogni immagine supportata in WebP ridimensionato.
//!
//! ## Pipeline:
//! 1. **Calcolo path output**: chiave sanitizzata con estensione `.webp`
//! 2. **Idempotenza**: se il file esiste già, nessun lavoro e nessuna statistica
//! 3. **Decode**: tramite il crate `image` (JPEG, PNG, WebP, GIF, TIFF, BMP)
//! 4. **Resize**: solo se più larga di 900px, Lanczos3, aspect ratio preservato
//! 5. **Encode**: WebP lossy qualità 80 tramite libwebp (crate `webp`)
//! 6. **Scrittura atomica**: file temporaneo + rename
//!
//! ## Error handling:
//! - Decode/encode falliti diventano `ImageCodecFailure` con il path sorgente
//! - Il chiamante logga e passa al file successivo
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = ImageProcessor::new(PathResolver::new("/output"));
//! match processor.process(&source)? {
//!     TranscodeOutcome::Converted(stat) => stats.record(stat),
//!     TranscodeOutcome::AlreadyPresent => {}
//! }
//! ```

use crate::error::PipelineError;
use crate::file_manager::{FileManager, SourceFile};
use crate::optimizer::path_resolver::PathResolver;
use crate::progress::{CompressionStat, TranscodeOutcome};
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Maximum width of a transcoded image
pub const MAX_IMAGE_WIDTH: u32 = 900;
/// Lossy WebP quality for images and thumbnails
pub const WEBP_QUALITY: f32 = 80.0;

/// Transcodes still images to resized WebP
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    resolver: PathResolver,
}

impl ImageProcessor {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Transcode one image, skipping it when its output already exists.
    pub fn process(&self, source: &SourceFile) -> Result<TranscodeOutcome, PipelineError> {
        let target = self.resolver.image_target(&source.relative_path);
        if target.path.exists() {
            debug!("Image already converted: {}", target.key);
            return Ok(TranscodeOutcome::AlreadyPresent);
        }

        let image = load_image(&source.absolute_path)?;
        let image = resize_to_width(image, MAX_IMAGE_WIDTH);
        let encoded = encode_webp(&image, WEBP_QUALITY)
            .map_err(|reason| PipelineError::image_codec(&source.absolute_path, reason))?;

        PathResolver::ensure_parent_dirs(&target.path)?;
        FileManager::write_atomic(&target.path, &encoded)?;

        let original_bytes = FileManager::file_size(&source.absolute_path)?;
        Ok(TranscodeOutcome::Converted(CompressionStat {
            original_bytes,
            converted_bytes: encoded.len() as u64,
            key: target.key,
        }))
    }
}

/// Decode an image file, mapping every failure to `ImageCodecFailure`
pub fn load_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    image::ImageReader::open(path)
        .map_err(|e| PipelineError::image_codec(path, e))?
        .with_guessed_format()
        .map_err(|e| PipelineError::image_codec(path, e))?
        .decode()
        .map_err(|e| PipelineError::image_codec(path, e))
}

/// Dimensions after capping the width at `max_width`.
///
/// Height is `round(height * max_width / width)`, never below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round();
    (max_width, (scaled as u32).max(1))
}

/// Downscale with Lanczos3 when wider than `max_width`; otherwise untouched
pub fn resize_to_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = scaled_dimensions(image.width(), image.height(), max_width);
    if width == image.width() {
        return image;
    }
    debug!("Resizing {}x{} -> {}x{}", image.width(), image.height(), width, height);
    image.resize_exact(width, height, FilterType::Lanczos3)
}

/// Lossy WebP encode at `quality` (0-100)
pub fn encode_webp(image: &DynamicImage, quality: f32) -> Result<Vec<u8>, String> {
    // libwebp only takes 8-bit RGB/RGBA buffers
    let normalized = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };
    let encoder = webp::Encoder::from_image(&normalized).map_err(|e| e.to_string())?;
    Ok(encoder.encode(quality).to_vec())
}
