//! The inference adapter.

use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use serde::Serialize;

use crate::draw::draw_detections;
use crate::error::VisionResult;
use crate::labels::LabelMap;
use crate::model::{DetectParams, ObjectDetector};

/// One detection rendered as a table row, in source-image pixel space.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRow {
    pub file: String,
    pub cls: u32,
    pub label: String,
    pub conf: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// Result of running inference on one image.
#[derive(Debug)]
pub struct Inference {
    /// A rendered copy of the input with detection boxes drawn. With zero
    /// detections this is the undecorated original.
    pub annotated: RgbImage,
    /// One row per kept detection; empty when nothing passed the filters.
    pub rows: Vec<DetectionRow>,
}

/// Detector plus label policy, constructed once and passed to callers.
pub struct InferenceService {
    detector: Arc<dyn ObjectDetector>,
    labels: LabelMap,
}

impl InferenceService {
    /// Builds a service around a detector and a label policy.
    #[must_use]
    pub fn new(detector: Arc<dyn ObjectDetector>, labels: LabelMap) -> Self {
        Self { detector, labels }
    }

    /// Returns the configured label map.
    #[must_use]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Runs one prediction and converts raw detections into table rows.
    ///
    /// The confidence threshold and class restriction in `params` are
    /// enforced here as well, so the contract holds for any backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the model invocation fails.
    pub fn run_inference(
        &self,
        image: &DynamicImage,
        filename: &str,
        params: &DetectParams,
    ) -> VisionResult<Inference> {
        let mut detections = self.detector.detect(image, params)?;
        detections.retain(|det| params.accepts(det));

        tracing::debug!(
            file = filename,
            boxes = detections.len(),
            imgsz = params.imgsz,
            conf = params.conf,
            "inference complete"
        );

        let annotated = draw_detections(image, &detections);

        let rows = detections
            .iter()
            .map(|det| DetectionRow {
                file: filename.to_string(),
                cls: det.class_id,
                label: self.labels.label_for(det.class_id),
                conf: det.confidence,
                xmin: det.bbox.xmin,
                ymin: det.bbox.ymin,
                xmax: det.bbox.xmax,
                ymax: det.bbox.ymax,
            })
            .collect();

        Ok(Inference { annotated, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Detection};

    /// Detector returning a fixed set of boxes, ignoring all filters.
    struct StaticDetector(Vec<Detection>);

    impl ObjectDetector for StaticDetector {
        fn detect(
            &self,
            _image: &DynamicImage,
            _params: &DetectParams,
        ) -> VisionResult<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox {
                xmin: 1.0,
                ymin: 1.0,
                xmax: 10.0,
                ymax: 10.0,
            },
        }
    }

    fn service(detections: Vec<Detection>) -> InferenceService {
        InferenceService::new(Arc::new(StaticDetector(detections)), LabelMap::coarse())
    }

    fn params(conf: f32, classes: Option<Vec<u32>>) -> DetectParams {
        DetectParams {
            imgsz: 640,
            conf,
            classes,
        }
    }

    #[test]
    fn test_unfiltered_rows_use_configured_labels() {
        let svc = service(vec![det(0, 0.8), det(3, 0.9), det(9, 0.5)]);
        let img = DynamicImage::new_rgb8(32, 32);
        let out = svc.run_inference(&img, "a.jpg", &params(0.25, None)).unwrap();

        assert_eq!(out.rows.len(), 3);
        let allowed = svc.labels().labels();
        for row in &out.rows {
            assert!(allowed.contains(&row.label.as_str()));
            assert_eq!(row.file, "a.jpg");
        }
    }

    #[test]
    fn test_class_filter_restricts_rows() {
        let svc = service(vec![det(0, 0.8), det(3, 0.9), det(9, 0.5)]);
        let img = DynamicImage::new_rgb8(32, 32);
        let filter = vec![3, 4, 5, 8];
        let out = svc
            .run_inference(&img, "a.jpg", &params(0.25, Some(filter.clone())))
            .unwrap();

        assert_eq!(out.rows.len(), 1);
        for row in &out.rows {
            assert!(filter.contains(&row.cls));
        }
    }

    #[test]
    fn test_empty_class_set_yields_no_rows() {
        let svc = service(vec![det(0, 0.8), det(3, 0.9)]);
        let img = DynamicImage::new_rgb8(32, 32);
        let out = svc
            .run_inference(&img, "a.jpg", &params(0.25, Some(Vec::new())))
            .unwrap();
        assert!(out.rows.is_empty());
    }

    #[test]
    fn test_confidence_threshold_applies() {
        let svc = service(vec![det(3, 0.2), det(3, 0.6)]);
        let img = DynamicImage::new_rgb8(32, 32);
        let out = svc.run_inference(&img, "a.jpg", &params(0.5, None)).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].conf, 0.6);
    }

    #[test]
    fn test_zero_boxes_returns_empty_table_and_original_image() {
        let svc = service(Vec::new());
        let img = DynamicImage::new_rgb8(20, 10);
        let out = svc.run_inference(&img, "a.jpg", &params(0.25, None)).unwrap();

        assert!(out.rows.is_empty());
        assert_eq!(out.annotated, img.to_rgb8());
    }

    #[test]
    fn test_unknown_class_id_label_fallback() {
        let svc = service(vec![det(77, 0.9)]);
        let img = DynamicImage::new_rgb8(32, 32);
        let out = svc.run_inference(&img, "a.jpg", &params(0.25, None)).unwrap();
        assert_eq!(out.rows[0].label, "77");
    }
}
