//! Multi-image detection batches.
//!
//! One batch is one user action: a set of uploaded photos run through the
//! detector with shared parameters. Raw images and progress go to the
//! database, but persistence trouble never blocks the detections the user
//! is waiting for.

use database::models::NewLogEntry;
use database::{append_log_best_effort, NewRawImage, Store};
use image::RgbImage;
use vision::{DetectParams, DetectionRow, InferenceService};

/// Suggested filename for the combined results download.
pub const CSV_FILENAME: &str = "detections_pixel_multi_image.csv";

const LOG_SOURCE: &str = "detect";

/// One photo as received from the user, still encoded.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Rendered result for one photo.
#[derive(Debug)]
pub struct AnnotatedImage {
    pub filename: String,
    pub image: RgbImage,
}

/// Everything a batch produced, including partial results when a later
/// image failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub images: Vec<AnnotatedImage>,
    pub rows: Vec<DetectionRow>,
    pub csv: String,
    /// Set when the batch was empty and nothing ran.
    pub warning: Option<String>,
    /// Set when an image failed; results up to that image are kept.
    pub error: Option<String>,
}

/// Runs detection over a set of uploaded images.
///
/// An empty batch short-circuits with a warning and touches neither the
/// store nor the model. A failed raw-image insert is logged and skipped;
/// a failed decode or inference aborts the remainder of the batch but
/// keeps everything produced so far.
pub async fn run_detection_batch(
    store: &dyn Store,
    inference: &InferenceService,
    params: &DetectParams,
    uploads: Vec<UploadedImage>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    if uploads.is_empty() {
        append_log_best_effort(store, NewLogEntry::warn(LOG_SOURCE, "no images uploaded")).await;
        outcome.warning = Some("Please upload at least one image.".to_string());
        return outcome;
    }

    let total = uploads.len();

    for (index, upload) in uploads.into_iter().enumerate() {
        let image = match image::load_from_memory(&upload.bytes) {
            Ok(image) => image,
            Err(e) => {
                append_log_best_effort(
                    store,
                    NewLogEntry::error(
                        LOG_SOURCE,
                        format!("failed to decode {}", upload.filename),
                        format!("{e:?}"),
                    ),
                )
                .await;
                outcome.error = Some(format!("failed to decode {}: {e}", upload.filename));
                break;
            }
        };

        let insert = store
            .insert_raw_image(NewRawImage {
                filename: upload.filename.clone(),
                content_type: upload.content_type.clone(),
                width: image.width() as i32,
                height: image.height() as i32,
                bytes: upload.bytes,
            })
            .await;
        if let Err(e) = insert {
            // Detection still runs; the upload just is not archived.
            append_log_best_effort(
                store,
                NewLogEntry::error(
                    LOG_SOURCE,
                    format!("failed to persist raw image {}", upload.filename),
                    format!("{e:?}"),
                ),
            )
            .await;
        }

        match inference.run_inference(&image, &upload.filename, params) {
            Ok(result) => {
                append_log_best_effort(
                    store,
                    NewLogEntry::info(
                        LOG_SOURCE,
                        format!(
                            "processed {} ({}/{}): {} detections",
                            upload.filename,
                            index + 1,
                            total,
                            result.rows.len()
                        ),
                    ),
                )
                .await;

                outcome.rows.extend(result.rows);
                outcome.images.push(AnnotatedImage {
                    filename: upload.filename,
                    image: result.annotated,
                });
            }
            Err(e) => {
                append_log_best_effort(
                    store,
                    NewLogEntry::error(
                        LOG_SOURCE,
                        format!("inference failed on {}", upload.filename),
                        format!("{e:?}"),
                    ),
                )
                .await;
                outcome.error = Some(format!("inference failed on {}: {e}", upload.filename));
                break;
            }
        }
    }

    append_log_best_effort(
        store,
        NewLogEntry::info(
            LOG_SOURCE,
            format!(
                "batch complete: {} of {} images, {} detections",
                outcome.images.len(),
                total,
                outcome.rows.len()
            ),
        ),
    )
    .await;

    outcome.csv = build_csv(&outcome.rows);
    outcome
}

/// Formats detection rows as CSV with a fixed column order.
#[must_use]
pub fn build_csv(rows: &[DetectionRow]) -> String {
    let mut csv = String::from("file,cls,label,conf,xmin,ymin,xmax,ymax\n");
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{:.4},{:.1},{:.1},{:.1},{:.1}\n",
            row.file, row.cls, row.label, row.conf, row.xmin, row.ymin, row.xmax, row.ymax
        ));
    }
    csv
}
