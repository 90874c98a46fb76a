//! Frame normalization: scale down to fit, then letterbox to the canonical size

use crate::error::{Result, SlideshowError};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// Letterbox fill color
const CANVAS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Size of `source` scaled to fit inside `target`, never enlarged
///
/// Aspect ratio is preserved; each side is at least one pixel.
pub fn fit_within(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }

    let scale = (tgt_w as f64 / src_w as f64)
        .min(tgt_h as f64 / src_h as f64)
        .min(1.0);
    if scale >= 1.0 {
        return source;
    }

    let w = ((src_w as f64 * scale).round() as u32).clamp(1, tgt_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, tgt_h);
    (w, h)
}

/// Top-left position that centers `inner` on `outer`
pub fn center_offset(inner: (u32, u32), outer: (u32, u32)) -> (i64, i64) {
    (
        (outer.0.saturating_sub(inner.0) / 2) as i64,
        (outer.1.saturating_sub(inner.1) / 2) as i64,
    )
}

/// Place `image` on an opaque canvas of exactly `target` size
pub fn letterbox(image: &DynamicImage, target: (u32, u32)) -> RgbImage {
    let source = (image.width(), image.height());
    let fitted = fit_within(source, target);

    let frame = if fitted == source {
        image.to_rgb8()
    } else {
        imageops::resize(&image.to_rgb8(), fitted.0, fitted.1, FilterType::Lanczos3)
    };

    let mut canvas = RgbImage::from_pixel(target.0, target.1, CANVAS_COLOR);
    let (x, y) = center_offset(fitted, target);
    imageops::overlay(&mut canvas, &frame, x, y);
    canvas
}

/// Normalize the image at `path` in place
///
/// The file is decoded by content (not extension) and rewritten in the format
/// its extension names, JPEG when the extension is unknown.
pub fn normalize_image(path: &Path, target: (u32, u32)) -> Result<()> {
    let failed = |reason: String| SlideshowError::NormalizeFailed {
        path: path.to_path_buf(),
        reason,
    };

    let image = ImageReader::open(path)
        .map_err(|e| failed(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| failed(e.to_string()))?
        .decode()
        .map_err(|e| failed(e.to_string()))?;

    let canvas = letterbox(&image, target);
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Jpeg);
    canvas
        .save_with_format(path, format)
        .map_err(|e| failed(e.to_string()))?;

    debug!(
        ?path,
        from_width = image.width(),
        from_height = image.height(),
        "normalized frame"
    );
    Ok(())
}

/// Normalize every image, leaving failures untouched
///
/// Each image is handled independently on the blocking pool. Returns the
/// number of images that were normalized.
pub async fn normalize_all(paths: &[PathBuf], target: (u32, u32)) -> usize {
    let mut normalized = 0;
    for path in paths {
        let owned = path.clone();
        let result = spawn_blocking(move || normalize_image(&owned, target)).await;
        match result {
            Ok(Ok(())) => normalized += 1,
            Ok(Err(e)) => warn!(?path, error = %e, "failed to normalize image, keeping original"),
            Err(e) => warn!(?path, error = %e, "normalization task panicked, keeping original"),
        }
    }
    normalized
}
