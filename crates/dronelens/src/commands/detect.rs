//! Detect command - runs a detection batch from the command line.
//!
//! Same pipeline as the web front end, but fed from local files and
//! writing annotated copies plus the CSV next to each other on disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use database::Store;
use vision::{DetectParams, InferenceService};

use crate::batch::{run_detection_batch, UploadedImage, CSV_FILENAME};

/// Inputs for one command-line detection batch.
#[derive(Debug, Clone)]
pub struct DetectArgs {
    pub images: Vec<PathBuf>,
    pub imgsz: u32,
    pub conf: f32,
    /// Label restriction; `None` keeps every class.
    pub labels: Option<Vec<String>>,
    pub out_dir: PathBuf,
}

/// Runs the detect command.
///
/// # Errors
///
/// Returns an error if inputs cannot be read, the batch fails partway,
/// or outputs cannot be written.
pub async fn run(store: &dyn Store, inference: &InferenceService, args: &DetectArgs) -> Result<()> {
    let mut uploads = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        uploads.push(UploadedImage {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            content_type: content_type_for(path),
            bytes,
        });
    }

    let params = DetectParams {
        imgsz: args.imgsz,
        conf: args.conf,
        classes: args
            .labels
            .as_ref()
            .map(|labels| inference.labels().ids_for_labels(labels)),
    };

    let outcome = run_detection_batch(store, inference, &params, uploads).await;

    if let Some(warning) = &outcome.warning {
        println!("{warning}");
        return Ok(());
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    for annotated in &outcome.images {
        let stem = Path::new(&annotated.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| annotated.filename.clone());
        let out_path = args.out_dir.join(format!("{stem}_annotated.png"));
        annotated
            .image
            .save(&out_path)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        println!("wrote {}", out_path.display());
    }

    let csv_path = args.out_dir.join(CSV_FILENAME);
    std::fs::write(&csv_path, &outcome.csv)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;
    println!(
        "{} detections across {} images, table at {}",
        outcome.rows.len(),
        outcome.images.len(),
        csv_path.display()
    );

    if let Some(error) = outcome.error {
        bail!("batch aborted: {error}");
    }

    Ok(())
}

fn content_type_for(path: &Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png".to_string(),
        _ => "image/jpeg".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use vision::LabelMap;

    use crate::test_support::{png_bytes, CountingDetector, MockStore};

    #[tokio::test]
    async fn test_detect_writes_annotated_images_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        std::fs::write(&input, png_bytes(32, 32)).unwrap();

        let store = MockStore::new();
        let service = InferenceService::new(
            Arc::new(CountingDetector::with_one_box()),
            LabelMap::coarse(),
        );

        let out_dir = dir.path().join("out");
        let args = DetectArgs {
            images: vec![input],
            imgsz: 640,
            conf: 0.25,
            labels: None,
            out_dir: out_dir.clone(),
        };

        run(&store, &service, &args).await.unwrap();

        assert!(out_dir.join("photo_annotated.png").exists());
        let csv = std::fs::read_to_string(out_dir.join(CSV_FILENAME)).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert_eq!(store.raw_image_count(), 1);
    }

    #[tokio::test]
    async fn test_detect_fails_on_unreadable_input() {
        let store = MockStore::new();
        let service = InferenceService::new(
            Arc::new(CountingDetector::with_one_box()),
            LabelMap::coarse(),
        );

        let args = DetectArgs {
            images: vec![PathBuf::from("does-not-exist.jpg")],
            imgsz: 640,
            conf: 0.25,
            labels: None,
            out_dir: PathBuf::from("out"),
        };

        assert!(run(&store, &service, &args).await.is_err());
    }
}
