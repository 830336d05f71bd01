//! ONNX Runtime YOLO backend (cargo feature `onnx`).
//!
//! Expects a YOLOv8-layout detection model: input `[1, 3, s, s]` RGB
//! normalized to `[0, 1]`, output `[1, 4 + nc, anchors]` with xywh rows
//! first and one row per class score after.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{VisionError, VisionResult};
use crate::model::{BoundingBox, DetectParams, Detection, ObjectDetector};

const DEFAULT_IOU: f32 = 0.45;
const LETTERBOX_FILL: u8 = 114;

fn model_err(e: ort::Error) -> VisionError {
    VisionError::Model(e.to_string())
}

/// YOLO detector running on ONNX Runtime.
pub struct YoloOnnx {
    // Session::run takes &mut self; detection itself is &self.
    session: Mutex<Session>,
    iou: f32,
}

impl YoloOnnx {
    /// Loads a model from an `.onnx` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load(path: &Path) -> VisionResult<Self> {
        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .commit_from_file(path)
            .map_err(model_err)?;

        tracing::info!(weights = %path.display(), "loaded ONNX detection model");

        Ok(Self {
            session: Mutex::new(session),
            iou: DEFAULT_IOU,
        })
    }
}

/// Letterbox state needed to map model-space boxes back to pixel space.
struct Letterbox {
    gain: f32,
    pad_x: f32,
    pad_y: f32,
}

fn letterbox(image: &DynamicImage, size: u32) -> (RgbImage, Letterbox) {
    let rgb = image.to_rgb8();
    let (w0, h0) = (rgb.width() as f32, rgb.height() as f32);
    let gain = (size as f32 / w0).min(size as f32 / h0);
    let new_w = ((w0 * gain).round() as u32).max(1);
    let new_h = ((h0 * gain).round() as u32).max(1);

    let resized = image::imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, image::Rgb([LETTERBOX_FILL; 3]));
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;
    image::imageops::overlay(&mut canvas, &resized, i64::from(pad_x), i64::from(pad_y));

    (
        canvas,
        Letterbox {
            gain,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

fn to_chw(canvas: &RgbImage) -> Vec<f32> {
    let size = canvas.width() as usize;
    let mut data = vec![0.0f32; 3 * size * size];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let idx = y as usize * size + x as usize;
        for c in 0..3 {
            data[c * size * size + idx] = f32::from(pixel[c]) / 255.0;
        }
    }
    data
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix = (a.xmax.min(b.xmax) - a.xmin.max(b.xmin)).max(0.0);
    let iy = (a.ymax.min(b.ymax) - a.ymin.max(b.ymin)).max(0.0);
    let inter = ix * iy;
    let area_a = (a.xmax - a.xmin) * (a.ymax - a.ymin);
    let area_b = (b.xmax - b.xmin) * (b.ymax - b.ymin);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Greedy per-class non-maximum suppression.
fn nms(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl ObjectDetector for YoloOnnx {
    fn detect(&self, image: &DynamicImage, params: &DetectParams) -> VisionResult<Vec<Detection>> {
        let size = if params.imgsz == 0 { 640 } else { params.imgsz };
        let (canvas, lb) = letterbox(image, size);
        let data = to_chw(&canvas);

        let tensor = Tensor::from_array(([1usize, 3, size as usize, size as usize], data))
            .map_err(model_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::Model("onnx session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs!["images" => tensor])
            .map_err(model_err)?;

        let output = outputs
            .iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| VisionError::Model("model returned no outputs".to_string()))?;
        let (shape, raw) = output.try_extract_tensor::<f32>().map_err(model_err)?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims.len() != 3 || dims[1] < 5 {
            return Err(VisionError::Model(format!(
                "unexpected model output shape {dims:?}"
            )));
        }
        let rows = dims[1] as usize;
        let anchors = dims[2] as usize;
        let num_classes = rows - 4;

        let (w0, h0) = (image.width() as f32, image.height() as f32);
        let mut candidates = Vec::new();

        for a in 0..anchors {
            let mut best_class = 0u32;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = raw[(4 + c) * anchors + a];
                if score > best_score {
                    best_score = score;
                    best_class = c as u32;
                }
            }

            let candidate = Detection {
                class_id: best_class,
                confidence: best_score,
                bbox: BoundingBox {
                    xmin: 0.0,
                    ymin: 0.0,
                    xmax: 0.0,
                    ymax: 0.0,
                },
            };
            if !params.accepts(&candidate) {
                continue;
            }

            let cx = raw[a];
            let cy = raw[anchors + a];
            let w = raw[2 * anchors + a];
            let h = raw[3 * anchors + a];

            let bbox = BoundingBox {
                xmin: ((cx - w / 2.0 - lb.pad_x) / lb.gain).clamp(0.0, w0),
                ymin: ((cy - h / 2.0 - lb.pad_y) / lb.gain).clamp(0.0, h0),
                xmax: ((cx + w / 2.0 - lb.pad_x) / lb.gain).clamp(0.0, w0),
                ymax: ((cy + h / 2.0 - lb.pad_y) / lb.gain).clamp(0.0, h0),
            };

            candidates.push(Detection { bbox, ..candidate });
        }

        Ok(nms(candidates, self.iou))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(class_id: u32, confidence: f32, xmin: f32, xmax: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox {
                xmin,
                ymin: 0.0,
                xmax,
                ymax: 10.0,
            },
        }
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let kept = nms(
            vec![
                boxed(3, 0.9, 0.0, 10.0),
                boxed(3, 0.6, 1.0, 11.0),
                boxed(3, 0.8, 50.0, 60.0),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_overlapping_different_classes() {
        let kept = nms(vec![boxed(3, 0.9, 0.0, 10.0), boxed(1, 0.6, 1.0, 11.0)], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_letterbox_preserves_aspect() {
        let image = DynamicImage::new_rgb8(200, 100);
        let (canvas, lb) = letterbox(&image, 64);
        assert_eq!(canvas.dimensions(), (64, 64));
        assert!((lb.gain - 0.32).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 16.0);
    }
}
