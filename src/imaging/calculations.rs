//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Height of an image scaled to `width` while keeping its aspect ratio.
///
/// Rounded to the nearest pixel and never below 1.
///
/// ```
/// # use catalog_media::imaging::scaled_height;
/// assert_eq!(scaled_height((1000, 750), 200), 150);
/// assert_eq!(scaled_height((1000, 1000), 300), 300);
/// ```
pub fn scaled_height(original: (u32, u32), width: u32) -> u32 {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return 1;
    }
    ((orig_h as f64 / orig_w as f64) * width as f64)
        .round()
        .max(1.0) as u32
}

/// Dimensions of a canvas with the given aspect ratio and long edge.
///
/// `aspect` is `(width, height)`; the short edge is rounded.
pub fn canvas_for_aspect(aspect: (u32, u32), long_edge: u32) -> (u32, u32) {
    let (aw, ah) = aspect;
    if aw >= ah {
        let h = (long_edge as f64 * ah as f64 / aw as f64).round() as u32;
        (long_edge, h)
    } else {
        let w = (long_edge as f64 * aw as f64 / ah as f64).round() as u32;
        (w, long_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // scaled_height tests
    // =========================================================================

    #[test]
    fn scaled_height_square() {
        assert_eq!(scaled_height((1000, 1000), 200), 200);
    }

    #[test]
    fn scaled_height_rounds_to_nearest() {
        // 563/1000 * 300 = 168.9 → 169
        assert_eq!(scaled_height((1000, 563), 300), 169);
        // 1000/750 * 200 = 266.67 → 267
        assert_eq!(scaled_height((750, 1000), 200), 267);
    }

    #[test]
    fn scaled_height_never_zero() {
        assert_eq!(scaled_height((4000, 1), 200), 1);
        assert_eq!(scaled_height((0, 100), 200), 1);
    }

    // =========================================================================
    // canvas_for_aspect tests
    // =========================================================================

    #[test]
    fn canvas_for_aspect_long_edge_1000() {
        assert_eq!(canvas_for_aspect((1, 1), 1000), (1000, 1000));
        assert_eq!(canvas_for_aspect((3, 4), 1000), (750, 1000));
        assert_eq!(canvas_for_aspect((4, 3), 1000), (1000, 750));
        assert_eq!(canvas_for_aspect((9, 16), 1000), (563, 1000));
        assert_eq!(canvas_for_aspect((16, 9), 1000), (1000, 563));
    }
}
