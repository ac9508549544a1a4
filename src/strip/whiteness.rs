//! White background stripping
//!
//! Makes near-white pixels fully transparent so a logo can sit on a
//! non-white surface without a visible white box.
//!
//! # Algorithm
//!
//! 1. Copy the RGBA pixel grid
//! 2. For every pixel, test `r > t && g > t && b > t`
//! 3. Matching pixels get alpha 0; RGB is left untouched
//!
//! The test is a per-channel AND, not a perceptual distance. A pixel that is
//! visually whitish but sits at or below the threshold on a single channel
//! stays opaque.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::Serialize;

// ============================================================
// Constants
// ============================================================

/// Default whiteness threshold
pub const DEFAULT_THRESHOLD: u8 = 240;

/// Threshold that strips only pure white (255, 255, 255)
pub const PURE_WHITE_THRESHOLD: u8 = 254;

const CHANNELS: usize = 4;
const ALPHA: usize = 3;

// ============================================================
// Types
// ============================================================

/// Options for white background stripping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripOptions {
    /// Each of R, G and B must be strictly greater than this value
    pub threshold: u8,

    /// Scan rows in parallel with rayon
    pub parallel: bool,
}

impl Default for StripOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            parallel: true,
        }
    }
}

impl StripOptions {
    /// Create a builder
    pub fn builder() -> StripOptionsBuilder {
        StripOptionsBuilder::default()
    }

    /// Options with the given threshold and default everything else
    pub fn with_threshold(threshold: u8) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// Strip only pure white pixels
    pub fn strict() -> Self {
        Self::with_threshold(PURE_WHITE_THRESHOLD)
    }
}

/// Builder for StripOptions
#[derive(Debug, Default)]
pub struct StripOptionsBuilder {
    options: StripOptions,
}

impl StripOptionsBuilder {
    /// Set whiteness threshold
    #[must_use]
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.options.threshold = threshold;
        self
    }

    /// Enable or disable parallel scanning
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.options.parallel = parallel;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> StripOptions {
        self.options
    }
}

/// Summary of a strip pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StripStats {
    /// Image dimensions
    pub image_size: (u32, u32),

    /// Total image pixels
    pub total_pixels: u64,

    /// Pixels matched by the whiteness predicate
    pub stripped_pixels: u64,
}

impl StripStats {
    /// Share of pixels made transparent, in percent
    pub fn coverage_percent(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        (self.stripped_pixels as f64 / self.total_pixels as f64) * 100.0
    }

    /// Check if any pixel was stripped
    pub fn has_stripped(&self) -> bool {
        self.stripped_pixels > 0
    }
}

/// The whiteness predicate.
#[inline]
pub fn is_whiteish(r: u8, g: u8, b: u8, threshold: u8) -> bool {
    r > threshold && g > threshold && b > threshold
}

/// Strip with default options other than `threshold`, discarding stats.
pub fn strip_white_background(image: &RgbaImage, threshold: u8) -> RgbaImage {
    WhiteBackgroundStripper::strip(image, &StripOptions::with_threshold(threshold)).0
}

// ============================================================
// Stripper
// ============================================================

/// White background stripping processor
pub struct WhiteBackgroundStripper;

impl WhiteBackgroundStripper {
    /// Strip a copy of `image`, leaving the input untouched
    pub fn strip(image: &RgbaImage, options: &StripOptions) -> (RgbaImage, StripStats) {
        let mut output = image.clone();
        let stats = Self::strip_in_place(&mut output, options);
        (output, stats)
    }

    /// Strip an owned RGBA image in place
    pub fn strip_in_place(image: &mut RgbaImage, options: &StripOptions) -> StripStats {
        let (width, height) = image.dimensions();
        let threshold = options.threshold;

        let stripped_pixels = if options.parallel && width > 0 {
            let row_len = width as usize * CHANNELS;
            let buf: &mut [u8] = image;
            buf.par_chunks_mut(row_len)
                .map(|row| Self::strip_row(row, threshold))
                .sum::<u64>()
        } else {
            let mut count = 0u64;
            for pixel in image.pixels_mut() {
                if Self::strip_pixel(pixel, threshold) {
                    count += 1;
                }
            }
            count
        };

        StripStats {
            image_size: (width, height),
            total_pixels: width as u64 * height as u64,
            stripped_pixels,
        }
    }

    /// Count matching pixels without modifying anything
    pub fn detect(image: &RgbaImage, options: &StripOptions) -> StripStats {
        let (width, height) = image.dimensions();
        let stripped_pixels = image
            .pixels()
            .filter(|p| is_whiteish(p.0[0], p.0[1], p.0[2], options.threshold))
            .count() as u64;

        StripStats {
            image_size: (width, height),
            total_pixels: width as u64 * height as u64,
            stripped_pixels,
        }
    }

    fn strip_row(row: &mut [u8], threshold: u8) -> u64 {
        let mut count = 0u64;
        for px in row.chunks_exact_mut(CHANNELS) {
            if is_whiteish(px[0], px[1], px[2], threshold) {
                px[ALPHA] = 0;
                count += 1;
            }
        }
        count
    }

    fn strip_pixel(pixel: &mut Rgba<u8>, threshold: u8) -> bool {
        let [r, g, b, _] = pixel.0;
        if is_whiteish(r, g, b, threshold) {
            pixel.0[ALPHA] = 0;
            true
        } else {
            false
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn both_modes(threshold: u8) -> [StripOptions; 2] {
        [
            StripOptions::builder().threshold(threshold).parallel(true).build(),
            StripOptions::builder().threshold(threshold).parallel(false).build(),
        ]
    }

    /// Deterministic test grid covering every channel value in some pixel
    fn gradient_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let r = ((x * 7 + y * 3) % 256) as u8;
            let g = ((x * 5 + y * 11) % 256) as u8;
            let b = ((x * 13 + y) % 256) as u8;
            let a = ((x + y * 17) % 256) as u8;
            Rgba([r, g, b, a])
        })
    }

    #[test]
    fn test_strip_options_default() {
        let opts = StripOptions::default();
        assert_eq!(opts.threshold, 240);
        assert!(opts.parallel);
    }

    #[test]
    fn test_strip_options_builder() {
        let opts = StripOptions::builder().threshold(200).parallel(false).build();
        assert_eq!(opts.threshold, 200);
        assert!(!opts.parallel);
    }

    #[test]
    fn test_strict_preset() {
        assert_eq!(StripOptions::strict().threshold, PURE_WHITE_THRESHOLD);
    }

    #[test]
    fn test_two_pixel_scenario() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        for opts in both_modes(240) {
            let (out, stats) = WhiteBackgroundStripper::strip(&image, &opts);
            assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 0]));
            assert_eq!(out.get_pixel(1, 0), &Rgba([10, 20, 30, 255]));
            assert_eq!(stats.stripped_pixels, 1);
            assert_eq!(stats.total_pixels, 2);
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let _ = strip_white_background(&image, 240);
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_pixelwise_properties() {
        let image = gradient_image(67, 41);
        for threshold in [0u8, 1, 100, 200, 240, 254, 255] {
            for opts in both_modes(threshold) {
                let (out, _) = WhiteBackgroundStripper::strip(&image, &opts);
                assert_eq!(out.dimensions(), image.dimensions());

                for (before, after) in image.pixels().zip(out.pixels()) {
                    let [r, g, b, _] = before.0;
                    if r > threshold && g > threshold && b > threshold {
                        assert_eq!(&after.0[..3], &before.0[..3]);
                        assert_eq!(after.0[3], 0);
                    } else {
                        assert_eq!(after, before);
                    }
                }
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let image = gradient_image(129, 33);
        let [par, seq] = both_modes(120);
        let (a, sa) = WhiteBackgroundStripper::strip(&image, &par);
        let (b, sb) = WhiteBackgroundStripper::strip(&image, &seq);
        assert_eq!(a.as_raw(), b.as_raw());
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_idempotent() {
        let image = gradient_image(50, 50);
        let once = strip_white_background(&image, 180);
        let twice = strip_white_background(&once, 180);
        assert_eq!(once.as_raw(), twice.as_raw());
    }

    #[test]
    fn test_threshold_boundary_is_strict() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([240, 240, 240, 255]));
        let out = strip_white_background(&image, 240);
        assert_eq!(out.get_pixel(0, 0).0[3], 255);

        let image = RgbaImage::from_pixel(1, 1, Rgba([241, 241, 241, 255]));
        let out = strip_white_background(&image, 240);
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_single_channel_below_threshold_stays_opaque() {
        // Pale yellow: visually whitish, blue channel at 200
        let image = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 200, 255]));
        let out = strip_white_background(&image, 240);
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 200, 255]));
    }

    #[test]
    fn test_threshold_zero() {
        let mut image = RgbaImage::new(3, 1);
        image.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([1, 1, 1, 255]));
        image.put_pixel(2, 0, Rgba([0, 128, 255, 255]));

        let out = strip_white_background(&image, 0);
        assert_eq!(out.get_pixel(0, 0).0[3], 255);
        assert_eq!(out.get_pixel(1, 0).0[3], 0);
        assert_eq!(out.get_pixel(2, 0).0[3], 255);
    }

    #[test]
    fn test_threshold_255_strips_nothing() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
        let (out, stats) = WhiteBackgroundStripper::strip(&image, &StripOptions::with_threshold(255));
        assert_eq!(out.as_raw(), image.as_raw());
        assert!(!stats.has_stripped());
    }

    #[test]
    fn test_strict_strips_only_pure_white() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 0, Rgba([254, 255, 255, 255]));

        let (out, _) = WhiteBackgroundStripper::strip(&image, &StripOptions::strict());
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(1, 0).0[3], 255);
    }

    #[test]
    fn test_already_transparent_white_counts_again() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([250, 250, 250, 0]));
        let (out, stats) = WhiteBackgroundStripper::strip(&image, &StripOptions::default());
        assert_eq!(out.as_raw(), image.as_raw());
        assert_eq!(stats.stripped_pixels, 4);
    }

    #[test]
    fn test_empty_image() {
        let image = RgbaImage::new(0, 0);
        for opts in both_modes(240) {
            let (out, stats) = WhiteBackgroundStripper::strip(&image, &opts);
            assert_eq!(out.dimensions(), (0, 0));
            assert_eq!(stats.total_pixels, 0);
            assert_eq!(stats.coverage_percent(), 0.0);
        }
    }

    #[test]
    fn test_detect_matches_strip_count() {
        let image = gradient_image(40, 30);
        let opts = StripOptions::with_threshold(150);
        let detected = WhiteBackgroundStripper::detect(&image, &opts);
        let (_, stripped) = WhiteBackgroundStripper::strip(&image, &opts);
        assert_eq!(detected, stripped);
    }

    #[test]
    fn test_coverage_percent() {
        let stats = StripStats {
            image_size: (100, 100),
            total_pixels: 10_000,
            stripped_pixels: 2_500,
        };
        assert!((stats.coverage_percent() - 25.0).abs() < 1e-9);
        assert!(stats.has_stripped());
    }

    #[test]
    fn test_is_whiteish() {
        assert!(is_whiteish(255, 255, 255, 240));
        assert!(!is_whiteish(240, 255, 255, 240));
        assert!(!is_whiteish(0, 0, 0, 0));
        assert!(is_whiteish(1, 1, 1, 0));
    }
}
