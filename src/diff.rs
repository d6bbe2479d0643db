//! Resemble-style perceptual diff between a reference and a regenerated image.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};

use crate::config::DEFAULT_DIFF_TOLERANCE;
use crate::Result;

const MISMATCH_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Share of the reference kept when fading it under the diff overlay.
const FADE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Mismatched pixels over the compared area, in percent, two decimals.
    pub mismatch_percent: f64,
    /// PNG-encoded visual diff.
    pub diff_image: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct PerceptualDiff {
    /// Largest per-channel difference still treated as equal.
    pub tolerance: u8,
}

impl Default for PerceptualDiff {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_DIFF_TOLERANCE,
        }
    }
}

impl PerceptualDiff {
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }

    /// Compare two encoded images. The compared area is the union of both
    /// sizes; a pixel present in only one image is a mismatch.
    pub fn diff(&self, reference: &[u8], regenerated: &[u8]) -> Result<DiffResult> {
        let a = image::load_from_memory(reference)?.to_rgba8();
        let b = image::load_from_memory(regenerated)?.to_rgba8();
        let (percent, overlay) = self.compare(&a, &b);
        Ok(DiffResult {
            mismatch_percent: percent,
            diff_image: encode_png(overlay)?,
        })
    }

    pub fn compare(&self, a: &RgbaImage, b: &RgbaImage) -> (f64, RgbaImage) {
        let width = a.width().max(b.width());
        let height = a.height().max(b.height());
        let mut overlay = RgbaImage::new(width, height);
        let mut mismatched: u64 = 0;

        for y in 0..height {
            for x in 0..width {
                let pa = pixel_at(a, x, y);
                let pb = pixel_at(b, x, y);
                let same = match (pa, pb) {
                    (Some(pa), Some(pb)) => self.pixels_match(pa, pb),
                    _ => false,
                };
                if same {
                    overlay.put_pixel(x, y, faded(pa.or(pb)));
                } else {
                    mismatched += 1;
                    overlay.put_pixel(x, y, MISMATCH_COLOR);
                }
            }
        }

        let total = u64::from(width) * u64::from(height);
        let percent = if total == 0 {
            0.0
        } else {
            round2(mismatched as f64 * 100.0 / total as f64)
        };
        (percent, overlay)
    }

    fn pixels_match(&self, a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
        a.0.iter()
            .zip(b.0.iter())
            .all(|(ca, cb)| ca.abs_diff(*cb) <= self.tolerance)
    }
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&Rgba<u8>> {
    (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y))
}

fn faded(pixel: Option<&Rgba<u8>>) -> Rgba<u8> {
    let Some(p) = pixel else {
        return Rgba([255, 255, 255, 255]);
    };
    let [r, g, b, a] = p.0;
    let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    let alpha = f32::from(a) / 255.0;
    // Composite over white, then fade toward white.
    let composited = luma * alpha + 255.0 * (1.0 - alpha);
    let v = (255.0 - (255.0 - composited) * FADE).round().clamp(0.0, 255.0) as u8;
    Rgba([v, v, v, 255])
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn encode_png(img: RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}
