//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use database::models::{
    NewCatalogEntry, NewLogEntry, NewRawImage, NewTrainRun, TrainRun, TrainRunFinish,
};
use database::{DbError, DbResult, Store};
use image::DynamicImage;
use vision::{BoundingBox, DetectParams, Detection, ObjectDetector, VisionError, VisionResult};

/// In-memory store with injectable failures and call counters.
#[derive(Default)]
pub struct MockStore {
    pub logs: Mutex<Vec<NewLogEntry>>,
    pub raw_images: Mutex<Vec<NewRawImage>>,
    pub catalog: Mutex<Vec<NewCatalogEntry>>,
    pub runs: Mutex<HashMap<i64, TrainRun>>,
    pub next_run_id: AtomicI64,
    pub fail_logs: bool,
    pub fail_raw_images: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_image_count(&self) -> usize {
        self.raw_images.lock().unwrap().len()
    }

    pub fn logs_at(&self, level: database::models::LogLevel) -> Vec<NewLogEntry> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn migrate(&self) -> DbResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }

    async fn insert_raw_image(&self, image: NewRawImage) -> DbResult<i64> {
        if self.fail_raw_images {
            return Err(DbError::NotFound("injected raw image failure".to_string()));
        }
        let mut images = self.raw_images.lock().unwrap();
        images.push(image);
        Ok(images.len() as i64)
    }

    async fn append_log(&self, entry: NewLogEntry) -> DbResult<()> {
        if self.fail_logs {
            return Err(DbError::NotFound("injected log failure".to_string()));
        }
        self.logs.lock().unwrap().push(entry);
        Ok(())
    }

    async fn insert_train_run(&self, run: NewTrainRun) -> DbResult<i64> {
        let id = self.next_run_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.runs.lock().unwrap().insert(
            id,
            TrainRun {
                id,
                started_at: Utc::now(),
                finished_at: None,
                model_name: Some(run.model_name),
                data_yaml: Some(run.data_yaml),
                epochs: Some(run.epochs),
                imgsz: Some(run.imgsz),
                batch: Some(run.batch),
                lr0: Some(run.lr0),
                train_imgs: run.train_imgs,
                val_imgs: run.val_imgs,
                best_map50: None,
                best_map5095: None,
                weights_path: None,
                notes: run.notes,
            },
        );
        Ok(id)
    }

    async fn get_train_run(&self, id: i64) -> DbResult<Option<TrainRun>> {
        Ok(self.runs.lock().unwrap().get(&id).cloned())
    }

    async fn finish_train_run(&self, id: i64, finish: TrainRunFinish) -> DbResult<()> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("train run {id}")))?;
        run.finished_at = Some(Utc::now());
        if finish.weights_path.is_some() {
            run.weights_path = finish.weights_path;
        }
        if finish.best_map50.is_some() {
            run.best_map50 = finish.best_map50;
        }
        if finish.best_map5095.is_some() {
            run.best_map5095 = finish.best_map5095;
        }
        Ok(())
    }

    async fn upsert_catalog_entry(&self, entry: NewCatalogEntry) -> DbResult<bool> {
        let mut catalog = self.catalog.lock().unwrap();
        let exists = catalog.iter().any(|e| {
            e.split == entry.split && e.file_type == entry.file_type && e.rel_path == entry.rel_path
        });
        if exists {
            return Ok(false);
        }
        catalog.push(entry);
        Ok(true)
    }

    async fn count_catalog_entries(&self) -> DbResult<i64> {
        Ok(self.catalog.lock().unwrap().len() as i64)
    }
}

/// Detector returning one fixed box per call and counting invocations.
pub struct CountingDetector {
    pub calls: AtomicUsize,
    pub detections: Vec<Detection>,
}

impl CountingDetector {
    pub fn with_one_box() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            detections: vec![Detection {
                class_id: 3,
                confidence: 0.9,
                bbox: BoundingBox {
                    xmin: 2.0,
                    ymin: 2.0,
                    xmax: 12.0,
                    ymax: 12.0,
                },
            }],
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ObjectDetector for CountingDetector {
    fn detect(
        &self,
        _image: &DynamicImage,
        _params: &DetectParams,
    ) -> VisionResult<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}

/// Detector that fails after a configurable number of successful calls.
pub struct FlakyDetector {
    pub calls: AtomicUsize,
    pub succeed_first: usize,
}

impl ObjectDetector for FlakyDetector {
    fn detect(
        &self,
        _image: &DynamicImage,
        _params: &DetectParams,
    ) -> VisionResult<Vec<Detection>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.succeed_first {
            Ok(Vec::new())
        } else {
            Err(VisionError::Model("simulated inference failure".to_string()))
        }
    }
}

/// Encodes a small solid image as PNG bytes for upload fixtures.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::new_rgb8(width, height);
    let mut buf = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("png encode");
    buf.into_inner()
}
