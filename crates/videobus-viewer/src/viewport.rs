//! Aspect-preserving viewport computation
//!
//! Pure geometry: given the stream's reference size and the current drawable
//! size, compute the largest centered rectangle that keeps the reference
//! aspect ratio. The renderer applies the result as the render-pass viewport
//! on every paint.

use thiserror::Error;

/// Errors from viewport computation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportError {
    /// The reference size has a zero dimension, so no aspect ratio exists
    #[error("reference size {0}x{1} has no aspect ratio")]
    DegenerateReference(u32, u32),
}

/// A rectangle in widget-local pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge, pixels from the drawable's left
    pub x: i32,
    /// Top edge, pixels from the drawable's top
    pub y: i32,
    /// Rectangle width in pixels
    pub width: u32,
    /// Rectangle height in pixels
    pub height: u32,
}

/// Fits the reference aspect ratio into a drawable area
///
/// Scales the reference size by `min(W/w0, H/h0)`, rounds the result, and
/// centers it; the origin truncates toward the drawable's top-left corner.
/// The returned rectangle is always fully contained in the drawable for any
/// drawable of at least 1x1.
///
/// A reference size with a zero dimension is a caller error, reported rather
/// than silently mapped to some rectangle.
pub fn fit(reference: (u32, u32), drawable: (u32, u32)) -> Result<Viewport, ViewportError> {
    let (ref_w, ref_h) = reference;
    if ref_w == 0 || ref_h == 0 {
        return Err(ViewportError::DegenerateReference(ref_w, ref_h));
    }

    let (out_w, out_h) = drawable;
    let scale = (out_w as f64 / ref_w as f64).min(out_h as f64 / ref_h as f64);

    // Rounding may not push the rectangle past the drawable edge.
    let width = ((ref_w as f64 * scale).round() as u32).min(out_w);
    let height = ((ref_h as f64 * scale).round() as u32).min(out_h);

    Ok(Viewport {
        x: ((out_w - width) / 2) as i32,
        y: ((out_h - height) / 2) as i32,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn assert_fit(reference: (u32, u32), drawable: (u32, u32), expected: Viewport) {
        assert_eq!(fit(reference, drawable).unwrap(), expected);
    }

    #[test]
    fn matching_ratio_fills_the_drawable() {
        // 640:480 and 800:600 are both 4:3, so the frame fills the area.
        assert_fit(
            (640, 480),
            (800, 600),
            Viewport {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            },
        );
    }

    #[test]
    fn wide_drawable_pillarboxes_and_centers() {
        // 4:3 content in a 16:9 area: full height, bars left and right.
        assert_fit(
            (640, 480),
            (1920, 1080),
            Viewport {
                x: 240,
                y: 0,
                width: 1440,
                height: 1080,
            },
        );
    }

    #[test]
    fn tall_drawable_letterboxes_and_centers() {
        // 4:3 content in a portrait area: full width, bars top and bottom.
        assert_fit(
            (640, 480),
            (600, 1000),
            Viewport {
                x: 0,
                y: 275,
                width: 600,
                height: 450,
            },
        );
    }

    #[test]
    fn odd_margins_truncate_toward_the_top_left() {
        // 100x100 content in 103x100: 3-pixel margin splits as 1 + 2.
        assert_fit(
            (100, 100),
            (103, 100),
            Viewport {
                x: 1,
                y: 0,
                width: 100,
                height: 100,
            },
        );
    }

    #[test]
    fn result_preserves_ratio_and_stays_in_bounds() {
        let cases = [
            ((640, 480), (1, 1)),
            ((640, 480), (13, 7)),
            ((1920, 1080), (640, 480)),
            ((16, 9), (4096, 4096)),
            ((3, 4), (1000, 10)),
        ];

        for (reference, drawable) in cases {
            let vp = fit(reference, drawable).unwrap();

            assert!(vp.x >= 0 && vp.y >= 0, "{reference:?} in {drawable:?}");
            assert!(vp.x as u32 + vp.width <= drawable.0, "{reference:?} in {drawable:?}");
            assert!(vp.y as u32 + vp.height <= drawable.1, "{reference:?} in {drawable:?}");

            // Ratio matches the reference within the rounding of one pixel.
            if vp.width > 0 && vp.height > 0 {
                let want = reference.0 as f64 / reference.1 as f64;
                let lo = (vp.width as f64 - 1.0) / (vp.height as f64 + 1.0);
                let hi = (vp.width as f64 + 1.0) / (vp.height as f64 - 1.0).max(f64::MIN_POSITIVE);
                assert!(lo <= want && want <= hi, "{reference:?} in {drawable:?} gave {vp:?}");
            }

            // Centered: the margins on either side differ by at most one pixel.
            let slack_x = drawable.0 - vp.width;
            let slack_y = drawable.1 - vp.height;
            assert!((vp.x as u32).abs_diff(slack_x - vp.x as u32) <= 1);
            assert!((vp.y as u32).abs_diff(slack_y - vp.y as u32) <= 1);
        }
    }

    #[test]
    fn zero_reference_dimension_is_an_error() {
        assert_eq!(fit((0, 480), (800, 600)), Err(ViewportError::DegenerateReference(0, 480)));
        assert_eq!(fit((640, 0), (800, 600)), Err(ViewportError::DegenerateReference(640, 0)));
    }

    #[test]
    fn same_input_yields_the_same_rectangle() {
        let a = fit((640, 480), (1357, 911)).unwrap();
        let b = fit((640, 480), (1357, 911)).unwrap();
        assert_eq!(a, b);
    }
}
