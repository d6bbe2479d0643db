use serde::{Deserialize, Serialize};

/// Pixel dimensions a frame is rasterized at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Round a frame's floating-point size to the nearest whole pixel.
    ///
    /// Degenerate sizes (zero, negative, NaN) clamp to one pixel so the
    /// renderer is never asked for an empty page.
    pub fn from_frame_size(width: f64, height: f64) -> Self {
        Self {
            width: round_dimension(width),
            height: round_dimension(height),
        }
    }
}

fn round_dimension(value: f64) -> u32 {
    if !value.is_finite() || value < 1.0 {
        return 1;
    }
    value.round().min(u32::MAX as f64) as u32
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_pixel() {
        let vp = Viewport::from_frame_size(100.4, 49.6);
        assert_eq!(vp.width, 100);
        assert_eq!(vp.height, 50);
    }

    #[test]
    fn half_pixels_round_away_from_zero() {
        let vp = Viewport::from_frame_size(10.5, 20.5);
        assert_eq!(vp, Viewport { width: 11, height: 21 });
    }

    #[test]
    fn degenerate_sizes_clamp_to_one() {
        assert_eq!(
            Viewport::from_frame_size(0.0, -3.0),
            Viewport { width: 1, height: 1 }
        );
        assert_eq!(Viewport::from_frame_size(f64::NAN, 0.2).width, 1);
    }

    #[test]
    fn display_uses_width_x_height() {
        let vp = Viewport {
            width: 1920,
            height: 1080,
        };
        assert_eq!(format!("{}", vp), "1920x1080");
    }
}
