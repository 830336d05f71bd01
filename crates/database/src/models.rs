//! Database model types.

use sqlx::types::chrono::{DateTime, Utc};

/// Severity level for an `app_logs` row, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the database representation of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File type tag used by the catalog ingester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Image,
    Annotation,
}

impl FileType {
    /// Returns the database representation of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Annotation => "annotation",
        }
    }

    /// Returns the allowed filename suffixes for this type.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Image => &["jpg", "jpeg", "png"],
            Self::Annotation => &["txt", "xml"],
        }
    }

    /// Checks whether a filename matches this type, case-insensitively.
    #[must_use]
    pub fn matches_filename(self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.extensions()
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")))
    }
}

/// Input for inserting a raw uploaded image.
#[derive(Debug, Clone)]
pub struct NewRawImage {
    pub filename: String,
    pub content_type: String,
    pub width: i32,
    pub height: i32,
    pub bytes: Vec<u8>,
}

/// Input for appending an audit log row.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub level: LogLevel,
    pub source: String,
    pub run_id: Option<i64>,
    pub message: String,
    pub detail: Option<String>,
}

impl NewLogEntry {
    /// Creates an INFO entry with no run id or detail.
    #[must_use]
    pub fn info(source: &str, message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            source: source.to_string(),
            run_id: None,
            message: message.into(),
            detail: None,
        }
    }

    /// Creates a WARN entry with no run id or detail.
    #[must_use]
    pub fn warn(source: &str, message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warn,
            source: source.to_string(),
            run_id: None,
            message: message.into(),
            detail: None,
        }
    }

    /// Creates an ERROR entry carrying diagnostic detail.
    #[must_use]
    pub fn error(source: &str, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            source: source.to_string(),
            run_id: None,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Tags the entry with a training run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Training run metadata stored in the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrainRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub model_name: Option<String>,
    pub data_yaml: Option<String>,
    pub epochs: Option<i32>,
    pub imgsz: Option<i32>,
    pub batch: Option<i32>,
    pub lr0: Option<f32>,
    pub train_imgs: Option<i32>,
    pub val_imgs: Option<i32>,
    pub best_map50: Option<f32>,
    pub best_map5095: Option<f32>,
    pub weights_path: Option<String>,
    pub notes: Option<String>,
}

/// Input for creating a new training run record.
#[derive(Debug, Clone)]
pub struct NewTrainRun {
    pub model_name: String,
    pub data_yaml: String,
    pub epochs: i32,
    pub imgsz: i32,
    pub batch: i32,
    pub lr0: f32,
    pub train_imgs: Option<i32>,
    pub val_imgs: Option<i32>,
    pub notes: Option<String>,
}

/// Fields merged into a training run at completion.
///
/// Every field is optional; a `None` keeps the existing column value.
#[derive(Debug, Clone, Default)]
pub struct TrainRunFinish {
    pub weights_path: Option<String>,
    pub best_map50: Option<f32>,
    pub best_map5095: Option<f32>,
}

/// Input for upserting a dataset catalog row.
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub split: String,
    pub file_type: String,
    pub filename: String,
    pub rel_path: String,
    pub abs_path: String,
}
