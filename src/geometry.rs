//! Overlay size and position resolution
//!
//! Platform placements are authored against a 1920×1080 reference frame.
//! [`resolve`] rescales them to the real video resolution, sizes the overlay
//! from the video height while keeping the watermark's aspect ratio, and
//! clamps the result into the frame.
//!
//! ```
//! use platmark::geometry::{resolve, Dimensions, Placement};
//!
//! let video = Dimensions::new(3840, 2160);
//! let watermark = Dimensions::new(300, 100);
//! let placement = Placement::Coordinates { x: 100.0, y: 900.0 };
//!
//! let overlay = resolve(video, watermark, 0.1, placement, 0.6).unwrap();
//! assert_eq!((overlay.x, overlay.height), (200, 216));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatermarkError};

/// Coordinate space placements are written in
pub const REFERENCE_FRAME: Dimensions = Dimensions::new(1920, 1080);

/// Gap kept from the frame edge when a position has to be pulled back in
pub const EDGE_GAP: i64 = 10;

/// Default fraction of the reference height below which an anchor is
/// measured from the bottom edge instead of the top
pub const DEFAULT_BOTTOM_THRESHOLD: f64 = 0.6;

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where a platform wants its watermark, in reference-frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Top-left anchor of the overlay
    Coordinates { x: f64, y: f64 },
    /// Distance of the overlay from the right and bottom edges
    Margins { right: f64, bottom: f64 },
}

/// Axis touched by a clamp adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
}

/// One correction applied while pulling the overlay into the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub axis: Axis,
    pub from: i64,
    pub to: i64,
}

/// Final overlay rectangle in video pixels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayGeometry {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    /// Clamp corrections, in the order they were applied
    pub adjustments: Vec<Adjustment>,
}

impl OverlayGeometry {
    /// Whether the rectangle lies fully inside a frame of `frame` size
    #[must_use]
    pub fn fits_within(&self, frame: Dimensions) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + i64::from(self.width) <= i64::from(frame.width)
            && self.y + i64::from(self.height) <= i64::from(frame.height)
    }
}

/// Scale `value` from a reference extent to an actual one, rounding down.
///
/// Multiplying before dividing keeps integer inputs exact, so e.g. 378 on a
/// 1080 reference maps to exactly 252 on a 720 frame. Taking the ratio
/// first (`actual * (value / reference)`) would floor that to 251; the
/// ratio-first form is deliberately not used.
fn rescale(actual: u32, value: f64, reference: u32) -> i64 {
    (f64::from(actual) * value / f64::from(reference)).floor() as i64
}

/// Overlay size for a video: height is `scale` of the video height, width
/// follows the watermark's aspect ratio.
pub fn overlay_size(video: Dimensions, watermark: Dimensions, scale: f64) -> Result<Dimensions> {
    if watermark.height == 0 {
        return Err(WatermarkError::DegenerateWatermark {
            width: watermark.width,
            height: watermark.height,
        });
    }

    let height = (f64::from(video.height) * scale).floor().max(0.0) as u32;
    let width = (f64::from(height) * f64::from(watermark.width) / f64::from(watermark.height))
        .floor() as u32;

    Ok(Dimensions::new(width, height))
}

/// Position before clamping.
fn raw_position(
    video: Dimensions,
    overlay: Dimensions,
    placement: Placement,
    bottom_threshold: f64,
) -> (i64, i64) {
    let reference = REFERENCE_FRAME;

    match placement {
        Placement::Coordinates { x, y } => {
            let x = rescale(video.width, x, reference.width);
            let y = if y > f64::from(reference.height) * bottom_threshold {
                let from_bottom = f64::from(reference.height) - y;
                i64::from(video.height) - rescale(video.height, from_bottom, reference.height)
            } else {
                rescale(video.height, y, reference.height)
            };
            (x, y)
        }
        Placement::Margins { right, bottom } => {
            let right = rescale(video.width, right, reference.width);
            let bottom = rescale(video.height, bottom, reference.height);
            (
                i64::from(video.width) - i64::from(overlay.width) - right,
                i64::from(video.height) - i64::from(overlay.height) - bottom,
            )
        }
    }
}

/// Resolve the overlay rectangle for one video.
///
/// Clamping runs in a fixed order: negative x, negative y, right overflow,
/// bottom overflow. When the overlay is larger than the frame the overflow
/// step can leave a negative coordinate; that is returned as is and
/// [`OverlayGeometry::fits_within`] reports it.
pub fn resolve(
    video: Dimensions,
    watermark: Dimensions,
    scale: f64,
    placement: Placement,
    bottom_threshold: f64,
) -> Result<OverlayGeometry> {
    let size = overlay_size(video, watermark, scale)?;
    let (mut x, mut y) = raw_position(video, size, placement, bottom_threshold);
    let mut adjustments = Vec::new();

    let mut adjust = |axis: Axis, value: &mut i64, to: i64| {
        adjustments.push(Adjustment { axis, from: *value, to });
        *value = to;
    };

    if x < 0 {
        adjust(Axis::X, &mut x, EDGE_GAP);
    }
    if y < 0 {
        adjust(Axis::Y, &mut y, EDGE_GAP);
    }
    let (width, height) = (i64::from(size.width), i64::from(size.height));
    if x + width > i64::from(video.width) {
        adjust(Axis::X, &mut x, i64::from(video.width) - width - EDGE_GAP);
    }
    if y + height > i64::from(video.height) {
        adjust(Axis::Y, &mut y, i64::from(video.height) - height - EDGE_GAP);
    }

    Ok(OverlayGeometry {
        x,
        y,
        width: size.width,
        height: size.height,
        adjustments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: Dimensions = Dimensions::new(1920, 1080);
    const UHD: Dimensions = Dimensions::new(3840, 2160);
    const LOGO: Dimensions = Dimensions::new(300, 100);

    fn coords(x: f64, y: f64) -> Placement {
        Placement::Coordinates { x, y }
    }

    #[test]
    fn overlay_height_follows_scale() {
        for (height, scale) in [(1080, 0.1), (720, 0.15), (2160, 0.05), (1080, 1.0), (480, 0.33)] {
            let video = Dimensions::new(1920, height);
            let size = overlay_size(video, LOGO, scale).unwrap();
            assert_eq!(size.height, (f64::from(height) * scale).floor() as u32);
        }
    }

    #[test]
    fn overlay_keeps_watermark_aspect() {
        let size = overlay_size(HD, Dimensions::new(512, 128), 0.1).unwrap();
        assert_eq!(size, Dimensions::new(432, 108));

        let size = overlay_size(Dimensions::new(1280, 720), Dimensions::new(333, 100), 0.1).unwrap();
        let ratio = f64::from(size.width) / f64::from(size.height);
        assert!((ratio - 3.33).abs() < 0.05, "ratio {ratio}");
    }

    #[test]
    fn zero_height_watermark_is_rejected() {
        let err = overlay_size(HD, Dimensions::new(300, 0), 0.1).unwrap_err();
        assert!(matches!(err, WatermarkError::DegenerateWatermark { .. }));
    }

    #[test]
    fn top_region_anchor_on_reference_frame_is_identity() {
        let geo = resolve(HD, LOGO, 0.1, coords(100.0, 200.0), 0.6).unwrap();
        assert_eq!((geo.x, geo.y), (100, 200));
        assert!(geo.adjustments.is_empty());
    }

    #[test]
    fn bottom_region_anchor_measures_from_bottom() {
        let geo = resolve(UHD, LOGO, 0.1, coords(100.0, 900.0), 0.6).unwrap();
        assert_eq!(geo.x, 200);
        assert_eq!(geo.y, 1800);
        assert!(geo.adjustments.is_empty());
    }

    #[test]
    fn threshold_is_strict_and_configurable() {
        // 648 is exactly 0.6 of 1080: still measured from the top
        let (_, y) = raw_position(Dimensions::new(1280, 720), LOGO_720, coords(0.0, 648.0), 0.6);
        assert_eq!(y, 432);

        // 700 sits between 0.6 and 0.7
        let low = raw_position(Dimensions::new(1280, 720), LOGO_720, coords(0.0, 700.0), 0.6);
        let high = raw_position(Dimensions::new(1280, 720), LOGO_720, coords(0.0, 700.0), 0.7);
        assert_eq!(low.1, 720 - 253);
        assert_eq!(high.1, 466);
    }

    const LOGO_720: Dimensions = Dimensions::new(216, 72);

    #[test]
    fn x_scales_linearly_with_width() {
        for width in [640_u32, 1280, 1920, 2560, 3840] {
            let video = Dimensions::new(width, 1080);
            let (x, _) = raw_position(video, LOGO, coords(480.0, 100.0), 0.6);
            assert_eq!(x, i64::from(width) / 4);
        }
    }

    #[test]
    fn rescale_is_exact_for_integer_inputs() {
        assert_eq!(rescale(720, 378.0, 1080), 252);
        // ratio-first rounding lands one pixel short here
        assert_eq!((720.0_f64 * (378.0 / 1080.0)).floor() as i64, 251);
        assert_eq!(rescale(1440, 378.0, 1080), 504);
        assert_eq!(rescale(2160, 180.0, 1080), 360);
    }

    #[test]
    fn margins_place_from_bottom_right() {
        let watermark = Dimensions::new(192, 100);
        let size = Dimensions::new(192, 100);
        let margins = Placement::Margins {
            right: 50.0,
            bottom: 50.0,
        };
        assert_eq!(raw_position(HD, size, margins, 0.6), (1678, 930));

        // scale chosen so the overlay comes out at exactly 192x100
        let geo = resolve(HD, watermark, 100.0 / 1080.0 + 1e-9, margins, 0.6).unwrap();
        assert_eq!((geo.width, geo.height), (192, 100));
        assert_eq!((geo.x, geo.y), (1678, 930));
    }

    #[test]
    fn negative_positions_snap_to_edge_gap() {
        let geo = resolve(HD, LOGO, 0.1, coords(-50.0, -20.0), 0.6).unwrap();
        assert_eq!((geo.x, geo.y), (EDGE_GAP, EDGE_GAP));
        assert_eq!(geo.adjustments.len(), 2);
        assert_eq!(geo.adjustments[0], Adjustment { axis: Axis::X, from: -50, to: 10 });
    }

    #[test]
    fn overflow_is_pulled_back_inside() {
        let geo = resolve(HD, LOGO, 0.1, coords(1900.0, 500.0), 0.6).unwrap();
        assert_eq!(geo.x, 1920 - 324 - EDGE_GAP);
        assert!(geo.fits_within(HD));
    }

    #[test]
    fn bottom_anchor_near_edge_overflows_then_clamps() {
        // bottom-region anchors land the overlay's top edge near the bottom
        let geo = resolve(HD, LOGO, 0.1, coords(100.0, 1000.0), 0.6).unwrap();
        assert_eq!(geo.y, 1080 - 108 - EDGE_GAP);
        assert_eq!(geo.adjustments.last().map(|a| a.axis), Some(Axis::Y));
    }

    #[test]
    fn oversized_overlay_can_stay_negative() {
        let tiny = Dimensions::new(200, 100);
        let geo = resolve(tiny, Dimensions::new(400, 100), 1.0, coords(0.0, 0.0), 0.6).unwrap();
        assert_eq!(geo.width, 400);
        assert!(geo.x < 0);
        assert!(!geo.fits_within(tiny));
    }

    #[test]
    fn fitting_overlays_always_end_inside_frame() {
        let frames = [
            Dimensions::new(640, 360),
            Dimensions::new(1280, 720),
            HD,
            Dimensions::new(1080, 1920),
            UHD,
        ];
        let placements = [
            coords(0.0, 0.0),
            coords(100.0, 200.0),
            coords(1800.0, 1000.0),
            coords(-300.0, 1079.0),
            coords(960.0, 647.0),
            coords(5000.0, 5000.0),
            Placement::Margins { right: 50.0, bottom: 50.0 },
            Placement::Margins { right: -100.0, bottom: 2000.0 },
            Placement::Margins { right: 3000.0, bottom: -40.0 },
        ];

        for frame in frames {
            for placement in placements {
                for scale in [0.05, 0.1, 0.2] {
                    let geo = resolve(frame, LOGO, scale, placement, 0.6).unwrap();
                    // clamping only guarantees bounds with an edge gap to spare
                    if i64::from(geo.width) + 2 * EDGE_GAP <= i64::from(frame.width)
                        && i64::from(geo.height) + 2 * EDGE_GAP <= i64::from(frame.height)
                    {
                        assert!(
                            geo.fits_within(frame),
                            "{frame} {placement:?} {scale}: {geo:?}"
                        );
                    }
                }
            }
        }
    }
}
