use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::geometry::CornerSet;

/// Outline `corners` on a copy of `image` for visual inspection.
///
/// The top-left corner gets a larger marker than the others so the winding
/// order can be read off the picture.
pub fn draw_region(image: &RgbaImage, corners: &CornerSet, color: Rgba<u8>) -> RgbaImage {
    let mut canvas = image.clone();
    let points = corners.as_array();

    for i in 0..4 {
        let a = points[i];
        let b = points[(i + 1) % 4];
        draw_line_segment_mut(
            &mut canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }

    let scale = image.width().max(image.height()) as i32;
    let radius = (scale / 100).max(2);
    for (i, p) in points.iter().enumerate() {
        let r = if i == 0 { radius * 2 } else { radius };
        draw_filled_circle_mut(&mut canvas, (p.x.round() as i32, p.y.round() as i32), r, color);
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{extract_corners, ImageBounds, Region};

    #[test]
    fn test_outline_touches_edges_only() {
        let image = RgbaImage::from_pixel(60, 60, Rgba([0, 0, 0, 255]));
        let corners =
            extract_corners(&Region::rect(10.0, 10.0, 40.0, 40.0), ImageBounds::new(60, 60))
                .unwrap();
        let yellow = Rgba([255, 255, 0, 255]);
        let drawn = draw_region(&image, &corners, yellow);

        assert_eq!(*drawn.get_pixel(30, 10), yellow);
        assert_eq!(*drawn.get_pixel(50, 30), yellow);
        assert_eq!(*drawn.get_pixel(30, 30), Rgba([0, 0, 0, 255]));
        // Source is untouched.
        assert_eq!(*image.get_pixel(30, 10), Rgba([0, 0, 0, 255]));
    }
}
