//! HTTP routes and handlers for the upload-and-detect front end.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbImage;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use vision::{DetectParams, DetectionRow};

use crate::batch::{run_detection_batch, UploadedImage, CSV_FILENAME};
use crate::server::error::ApiError;
use crate::server::state::AppState;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const DEFAULT_IMGSZ: u32 = 640;
const DEFAULT_CONF: f32 = 0.25;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/detect", post(detect))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Serialize)]
struct AnnotatedImageOut {
    filename: String,
    png_base64: String,
}

#[derive(Serialize)]
struct DetectResponse {
    images: Vec<AnnotatedImageOut>,
    rows: Vec<DetectionRow>,
    csv: String,
    csv_filename: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Accepts a multipart form with repeated `image` file parts and optional
/// `imgsz`, `conf` and `classes` text parts. A missing `classes` part
/// means no restriction; an empty one means no classes at all.
async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let mut uploads = Vec::new();
    let mut imgsz = DEFAULT_IMGSZ;
    let mut conf = DEFAULT_CONF;
    let mut labels: Option<Vec<String>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                uploads.push(UploadedImage {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "imgsz" => {
                imgsz = read_text(field).await?.parse().map_err(|_| {
                    ApiError::BadRequest("imgsz must be a positive integer".to_string())
                })?;
            }
            "conf" => {
                conf = read_text(field).await?.parse().map_err(|_| {
                    ApiError::BadRequest("conf must be a number".to_string())
                })?;
            }
            "classes" => {
                labels = Some(parse_classes(&read_text(field).await?));
            }
            _ => {}
        }
    }

    let params = DetectParams {
        imgsz,
        conf,
        classes: labels.map(|l| state.inference.labels().ids_for_labels(&l)),
    };

    let outcome =
        run_detection_batch(state.store.as_ref(), &state.inference, &params, uploads).await;

    let mut images = Vec::with_capacity(outcome.images.len());
    for annotated in &outcome.images {
        images.push(AnnotatedImageOut {
            filename: annotated.filename.clone(),
            png_base64: encode_png(&annotated.image)?,
        });
    }

    Ok(Json(DetectResponse {
        images,
        rows: outcome.rows,
        csv: outcome.csv,
        csv_filename: CSV_FILENAME,
        warning: outcome.warning,
        error: outcome.error,
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Splits a comma-separated label list; an empty string yields an empty
/// restriction set, not "no restriction".
fn parse_classes(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn encode_png(image: &RgbImage) -> Result<String, ApiError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(BASE64.encode(buf.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classes_splits_and_trims() {
        assert_eq!(parse_classes("car, people"), vec!["car", "people"]);
        assert_eq!(parse_classes("motor"), vec!["motor"]);
    }

    #[test]
    fn test_parse_classes_empty_string_is_empty_set() {
        assert!(parse_classes("").is_empty());
        assert!(parse_classes(" , ").is_empty());
    }

    #[test]
    fn test_encode_png_produces_base64() {
        let image = RgbImage::new(4, 4);
        let encoded = encode_png(&image).unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        // PNG magic bytes.
        assert_eq!(&decoded[..4], &[0x89, b'P', b'N', b'G']);
    }
}
