//! Detection overlay rendering.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::model::Detection;

const BOX_THICKNESS: u32 = 2;

// One color per VisDrone class id; higher ids wrap.
const PALETTE: [[u8; 3]; 10] = [
    [230, 57, 70],
    [244, 162, 97],
    [233, 196, 106],
    [42, 157, 143],
    [38, 70, 83],
    [69, 123, 157],
    [168, 218, 220],
    [131, 56, 236],
    [58, 134, 255],
    [251, 86, 7],
];

/// Returns a copy of the image with one hollow rectangle per detection.
///
/// Boxes are clamped to the image bounds; degenerate boxes are skipped.
/// An empty detection slice returns the undecorated original.
#[must_use]
pub fn draw_detections(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = (canvas.width(), canvas.height());

    for det in detections {
        let color = Rgb(PALETTE[det.class_id as usize % PALETTE.len()]);

        let xmin = det.bbox.xmin.max(0.0) as i32;
        let ymin = det.bbox.ymin.max(0.0) as i32;
        let xmax = (det.bbox.xmax.min(width as f32 - 1.0)) as i32;
        let ymax = (det.bbox.ymax.min(height as f32 - 1.0)) as i32;

        if xmax <= xmin || ymax <= ymin {
            continue;
        }

        for inset in 0..BOX_THICKNESS as i32 {
            let w = xmax - xmin - 2 * inset;
            let h = ymax - ymin - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(xmin + inset, ymin + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn det(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Detection {
        Detection {
            class_id: 3,
            confidence: 0.9,
            bbox: BoundingBox {
                xmin,
                ymin,
                xmax,
                ymax,
            },
        }
    }

    #[test]
    fn test_empty_detections_leave_image_untouched() {
        let source = DynamicImage::new_rgb8(32, 24);
        let rendered = draw_detections(&source, &[]);
        assert_eq!(rendered, source.to_rgb8());
    }

    #[test]
    fn test_boxes_modify_pixels() {
        let source = DynamicImage::new_rgb8(32, 24);
        let rendered = draw_detections(&source, &[det(4.0, 4.0, 20.0, 16.0)]);
        assert_ne!(rendered, source.to_rgb8());
        assert_eq!(rendered.dimensions(), (32, 24));
    }

    #[test]
    fn test_out_of_bounds_boxes_are_clamped() {
        let source = DynamicImage::new_rgb8(16, 16);
        // Must not panic on coordinates past the edge or fully negative.
        let rendered = draw_detections(
            &source,
            &[det(-10.0, -10.0, 100.0, 100.0), det(50.0, 50.0, 60.0, 60.0)],
        );
        assert_eq!(rendered.dimensions(), (16, 16));
    }
}
