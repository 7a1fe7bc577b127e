use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;

use crate::capability::backend::DiffCapability;

/// Mean absolute RGB difference, expressed as a percentage of full scale.
///
/// The candidate is resized to the reference's dimensions before comparing,
/// so a reference captured at another resolution still yields a score.
pub struct PixelDiffBackend {
    filter: FilterType,
}

impl PixelDiffBackend {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Compare two decoded images. Public so callers holding pixels can skip
    /// the decode step.
    pub fn compare(&self, reference: &RgbImage, candidate: &RgbImage) -> f64 {
        let (width, height) = reference.dimensions();
        if width == 0 || height == 0 {
            return 0.0;
        }

        let resized;
        let candidate = if candidate.dimensions() != (width, height) {
            resized = image::imageops::resize(candidate, width, height, self.filter);
            &resized
        } else {
            candidate
        };

        let total: u64 = reference
            .as_raw()
            .iter()
            .zip(candidate.as_raw().iter())
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum();
        let samples = reference.as_raw().len() as f64;
        (total as f64 / (samples * 255.0)) * 100.0
    }
}

impl Default for PixelDiffBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCapability for PixelDiffBackend {
    fn name(&self) -> &'static str {
        "pixel_diff"
    }

    fn percent_difference(&self, reference: &[u8], candidate: &[u8]) -> Result<f64> {
        let reference = decode_rgb(reference).context("decode reference image")?;
        let candidate = decode_rgb(candidate).context("decode incident image")?;
        Ok(self.compare(&reference, &candidate))
    }
}

fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode png");
        out.into_inner()
    }

    #[test]
    fn identical_images_have_no_difference() {
        let backend = PixelDiffBackend::new();
        let img = png(16, 16, [10, 200, 30]);
        let pct = backend.percent_difference(&img, &img).expect("diff");
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn opposite_images_differ_completely() {
        let backend = PixelDiffBackend::new();
        let black = png(8, 8, [0, 0, 0]);
        let white = png(8, 8, [255, 255, 255]);
        let pct = backend.percent_difference(&black, &white).expect("diff");
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn size_mismatch_is_resized_not_rejected() {
        let backend = PixelDiffBackend::new().with_filter(FilterType::Nearest);
        let reference = png(32, 24, [0, 0, 0]);
        let candidate = png(64, 48, [255, 255, 255]);
        let pct = backend
            .percent_difference(&reference, &candidate)
            .expect("diff");
        assert!((pct - 100.0).abs() < 1e-6);

        let same_color_bigger = png(64, 48, [0, 0, 0]);
        let pct = backend
            .percent_difference(&reference, &same_color_bigger)
            .expect("diff");
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn undecodable_bytes_are_an_error() {
        let backend = PixelDiffBackend::new();
        let img = png(4, 4, [1, 2, 3]);
        assert!(backend.percent_difference(&img, b"not an image").is_err());
    }
}
