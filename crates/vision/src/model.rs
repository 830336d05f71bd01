//! The detection-model boundary.

use std::sync::{Arc, Mutex};

use image::DynamicImage;

use crate::error::{VisionError, VisionResult};

/// Axis-aligned box in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// One predicted box with class and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Parameters for one prediction call.
#[derive(Debug, Clone, Default)]
pub struct DetectParams {
    /// Target inference resolution; the backend resizes internally.
    pub imgsz: u32,
    /// Minimum confidence to keep a box.
    pub conf: f32,
    /// Class restriction. `None` means no restriction; `Some(ids)`
    /// restricts strictly, so an empty set yields no boxes.
    pub classes: Option<Vec<u32>>,
}

impl DetectParams {
    /// Checks whether a detection passes the confidence and class
    /// constraints.
    #[must_use]
    pub fn accepts(&self, det: &Detection) -> bool {
        if det.confidence < self.conf {
            return false;
        }
        match &self.classes {
            None => true,
            Some(ids) => ids.contains(&det.class_id),
        }
    }
}

/// A pretrained object-detection model.
///
/// Implementations own preprocessing (resize, normalization) and return
/// boxes in the pixel space of the input image.
pub trait ObjectDetector: Send + Sync {
    /// Runs prediction on one image.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be invoked.
    fn detect(&self, image: &DynamicImage, params: &DetectParams) -> VisionResult<Vec<Detection>>;
}

type DetectorFactory =
    Box<dyn Fn() -> Result<Box<dyn ObjectDetector>, VisionError> + Send + Sync>;

/// Loads a detector at most once per process.
///
/// Construction is deferred to the first `detect` call and guarded by a
/// mutex over a single initialization slot, so concurrent first calls
/// build the model exactly once.
pub struct LazyDetector {
    factory: DetectorFactory,
    slot: Mutex<Option<Arc<dyn ObjectDetector>>>,
}

impl LazyDetector {
    /// Wraps a fallible detector factory.
    #[must_use]
    pub fn new(
        factory: impl Fn() -> Result<Box<dyn ObjectDetector>, VisionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    fn instance(&self) -> VisionResult<Arc<dyn ObjectDetector>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| VisionError::Model("detector init lock poisoned".to_string()))?;

        if let Some(detector) = slot.as_ref() {
            return Ok(Arc::clone(detector));
        }

        tracing::info!("loading detection model");
        let detector: Arc<dyn ObjectDetector> = Arc::from((self.factory)()?);
        *slot = Some(Arc::clone(&detector));
        Ok(detector)
    }
}

impl ObjectDetector for LazyDetector {
    fn detect(&self, image: &DynamicImage, params: &DetectParams) -> VisionResult<Vec<Detection>> {
        self.instance()?.detect(image, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullDetector;

    impl ObjectDetector for NullDetector {
        fn detect(
            &self,
            _image: &DynamicImage,
            _params: &DetectParams,
        ) -> VisionResult<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_lazy_detector_builds_once() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        let lazy = LazyDetector::new(|| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullDetector))
        });

        let img = DynamicImage::new_rgb8(4, 4);
        let params = DetectParams::default();
        lazy.detect(&img, &params).unwrap();
        lazy.detect(&img, &params).unwrap();
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_detector_propagates_factory_failure() {
        let lazy = LazyDetector::new(|| Err(VisionError::Model("weights missing".to_string())));
        let img = DynamicImage::new_rgb8(4, 4);
        assert!(lazy.detect(&img, &DetectParams::default()).is_err());
    }

    #[test]
    fn test_params_accept_logic() {
        let det = Detection {
            class_id: 3,
            confidence: 0.6,
            bbox: BoundingBox {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 10.0,
                ymax: 10.0,
            },
        };

        let open = DetectParams {
            imgsz: 640,
            conf: 0.25,
            classes: None,
        };
        assert!(open.accepts(&det));

        let filtered = DetectParams {
            classes: Some(vec![1, 2]),
            ..open.clone()
        };
        assert!(!filtered.accepts(&det));

        let empty = DetectParams {
            classes: Some(Vec::new()),
            ..open.clone()
        };
        assert!(!empty.accepts(&det));

        let low_conf = DetectParams {
            conf: 0.9,
            ..open
        };
        assert!(!low_conf.accepts(&det));
    }
}
