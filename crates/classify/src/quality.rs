//! Image quality checks for converted invoice pages.
//!
//! Each page is decoded, converted to grayscale and measured four ways:
//!
//! | Check | Metric | Threshold |
//! |-------|--------|-----------|
//! | resolution | width and height in pixels | `min_width`, `min_height` |
//! | brightness | mean intensity (0-255) | `min_brightness..=max_brightness` |
//! | contrast | intensity standard deviation | `min_contrast` |
//! | sharpness | variance of the 4-neighbour Laplacian | `min_sharpness` |
//!
//! Every check contributes a sub-score in `[0, 1]`; the page score is their
//! mean. A page is valid when every check passes and the score reaches
//! `min_score`. Quality results are informational: callers log them and carry
//! the average score forward.
use bytes::Bytes;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ClassifyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_contrast: f64,
    pub min_sharpness: f64,
    pub min_score: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_width: 600,
            min_height: 600,
            min_brightness: 40.0,
            max_brightness: 245.0,
            min_contrast: 20.0,
            min_sharpness: 100.0,
            min_score: 0.5,
        }
    }
}

/// Measurements and verdict for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageQuality {
    pub width: u32,
    pub height: u32,
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
    pub score: f64,
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Aggregate over all pages of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub all_valid: bool,
    pub average_score: f64,
    pub issues: Vec<String>,
    /// Per-page results; `None` for pages that failed to decode.
    pub pages: Vec<Option<ImageQuality>>,
}

/// Assess a single encoded image.
pub fn assess_image(data: &[u8], config: &QualityConfig) -> Result<ImageQuality, ClassifyError> {
    let gray = image::load_from_memory(data)
        .map_err(|e| ClassifyError::Decode(e.to_string()))?
        .to_luma8();
    Ok(assess_gray(&gray, config))
}

fn assess_gray(gray: &GrayImage, config: &QualityConfig) -> ImageQuality {
    let (width, height) = gray.dimensions();
    let (brightness, contrast) = mean_and_std_dev(gray);
    let sharpness = laplacian_variance(gray);
    let mut issues = Vec::new();

    let resolution_score = ratio(f64::from(width), f64::from(config.min_width))
        .min(ratio(f64::from(height), f64::from(config.min_height)));
    if width < config.min_width || height < config.min_height {
        issues.push(format!(
            "low resolution ({width}x{height} < {}x{})",
            config.min_width, config.min_height
        ));
    }

    let brightness_score = if brightness < config.min_brightness {
        issues.push(format!(
            "too dark ({brightness:.1} < {:.1})",
            config.min_brightness
        ));
        ratio(brightness, config.min_brightness)
    } else if brightness > config.max_brightness {
        issues.push(format!(
            "too bright ({brightness:.1} > {:.1})",
            config.max_brightness
        ));
        ratio(255.0 - brightness, 255.0 - config.max_brightness)
    } else {
        1.0
    };

    let contrast_score = ratio(contrast, config.min_contrast);
    if contrast < config.min_contrast {
        issues.push(format!(
            "low contrast ({contrast:.1} < {:.1})",
            config.min_contrast
        ));
    }

    let sharpness_score = ratio(sharpness, config.min_sharpness);
    if sharpness < config.min_sharpness {
        issues.push(format!(
            "blurry ({sharpness:.1} < {:.1})",
            config.min_sharpness
        ));
    }

    let score = (resolution_score + brightness_score + contrast_score + sharpness_score) / 4.0;
    ImageQuality {
        width,
        height,
        brightness,
        contrast,
        sharpness,
        score,
        valid: issues.is_empty() && score >= config.min_score,
        issues,
    }
}

/// Validate every page and aggregate the results.
///
/// An empty page list is reported invalid with score 0.
pub fn validate_all_images(images: &[Bytes], config: &QualityConfig) -> QualityReport {
    if images.is_empty() {
        return QualityReport {
            all_valid: false,
            average_score: 0.0,
            issues: vec!["no images supplied".to_string()],
            pages: Vec::new(),
        };
    }

    let mut issues = Vec::new();
    let mut pages = Vec::with_capacity(images.len());
    let mut total = 0.0;
    let mut all_valid = true;

    for (idx, data) in images.iter().enumerate() {
        let page = idx + 1;
        match assess_image(data, config) {
            Ok(quality) => {
                total += quality.score;
                all_valid &= quality.valid;
                issues.extend(quality.issues.iter().map(|i| format!("page {page}: {i}")));
                if quality.issues.is_empty() && !quality.valid {
                    issues.push(format!(
                        "page {page}: score {:.2} below {:.2}",
                        quality.score, config.min_score
                    ));
                }
                pages.push(Some(quality));
            }
            Err(err) => {
                all_valid = false;
                issues.push(format!("page {page}: {err}"));
                pages.push(None);
            }
        }
    }

    let average_score = total / images.len() as f64;
    debug!(pages = images.len(), average_score, all_valid, "assessed page quality");
    QualityReport {
        all_valid,
        average_score,
        issues,
        pages,
    }
}

fn ratio(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 1.0;
    }
    (value / threshold).clamp(0.0, 1.0)
}

fn mean_and_std_dev(img: &GrayImage) -> (f64, f64) {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for pixel in img.pixels() {
        let v = f64::from(pixel.0[0]);
        sum += v;
        sum_sq += v * v;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - mean * mean;
    (mean, variance.max(0.0).sqrt())
}

fn laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let px = |x: u32, y: u32| f64::from(img.get_pixel(x, y).0[0]);

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }
    let mean = sum / count as f64;
    ((sum_sq / count as f64) - mean * mean).max(0.0)
}
