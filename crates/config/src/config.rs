use std::path::PathBuf;

use anyhow::Context;

/// Returns the default root of the VisDrone dataset tree.
#[must_use]
pub fn default_data_root() -> PathBuf {
    #[cfg(target_os = "windows")]
    let fallback = PathBuf::from(r"D:\VisDrone\datasets");

    #[cfg(not(target_os = "windows"))]
    let fallback = PathBuf::from("/workspace/visdrone/datasets");

    fallback
}

/// One directory to scan during catalog ingestion.
#[derive(Debug, Clone)]
pub struct DirEntrySpec {
    /// Dataset split tag (`train` or `val`).
    pub split: &'static str,
    /// File type tag (`image` or `annotation`).
    pub file_type: &'static str,
    /// Directory path relative to the data root.
    pub rel_dir: &'static str,
}

/// The four VisDrone directories the ingester scans by default.
pub const DEFAULT_DIR_SPECS: &[DirEntrySpec] = &[
    DirEntrySpec {
        split: "train",
        file_type: "image",
        rel_dir: "VisDrone2019-DET-train/images",
    },
    DirEntrySpec {
        split: "train",
        file_type: "annotation",
        rel_dir: "VisDrone2019-DET-train/annotations",
    },
    DirEntrySpec {
        split: "val",
        file_type: "image",
        rel_dir: "VisDrone2019-DET-val/images",
    },
    DirEntrySpec {
        split: "val",
        file_type: "annotation",
        rel_dir: "VisDrone2019-DET-val/annotations",
    },
];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL.
    pub database_url: String,

    /// Root of the dataset tree; catalog paths are stored relative to this.
    pub data_root: PathBuf,

    /// Directory probed for model weights (`best.pt`, then `yolov8n.pt`).
    pub models_dir: PathBuf,

    /// Explicit weights override; wins over the probe when set.
    pub weights_override: Option<PathBuf>,

    /// Directory training runs write their artifacts into.
    pub runs_dir: PathBuf,

    /// External training command invoked by the training driver.
    pub trainer_command: String,

    /// Listen address for the interactive front end.
    pub listen_addr: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DATABASE_URL`: `PostgreSQL` connection string
    ///
    /// Optional environment variables:
    /// - `DATA_ROOT`: dataset root directory
    /// - `MODELS_DIR`: weights directory (default: `models`)
    /// - `WEIGHTS_PATH`: explicit weights file, skips the probe
    /// - `RUNS_DIR`: training output directory (default: `runs/train`)
    /// - `TRAINER_COMMAND`: external training program (default: `yolo`)
    /// - `LISTEN_ADDR`: front-end bind address (default: `127.0.0.1:8080`)
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;

        let data_root =
            std::env::var("DATA_ROOT").map_or_else(|_| default_data_root(), PathBuf::from);

        let models_dir =
            std::env::var("MODELS_DIR").map_or_else(|_| PathBuf::from("models"), PathBuf::from);

        let weights_override = std::env::var("WEIGHTS_PATH").ok().map(PathBuf::from);

        let runs_dir =
            std::env::var("RUNS_DIR").map_or_else(|_| PathBuf::from("runs/train"), PathBuf::from);

        let trainer_command =
            std::env::var("TRAINER_COMMAND").unwrap_or_else(|_| "yolo".to_string());

        let listen_addr =
            std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        Ok(Self {
            database_url,
            data_root,
            models_dir,
            weights_override,
            runs_dir,
            trainer_command,
            listen_addr,
        })
    }

    /// Resolves the detection weights file.
    ///
    /// Probe order: explicit override, then `models_dir/best.pt`, then
    /// `models_dir/yolov8n.pt`. Returns `None` when nothing exists.
    #[must_use]
    pub fn resolve_weights(&self) -> Option<PathBuf> {
        if let Some(path) = &self.weights_override {
            return Some(path.clone());
        }

        let best = self.models_dir.join("best.pt");
        if best.exists() {
            return Some(best);
        }

        let baseline = self.models_dir.join("yolov8n.pt");
        if baseline.exists() {
            return Some(baseline);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dir_specs_cover_both_splits() {
        let splits: Vec<_> = DEFAULT_DIR_SPECS.iter().map(|d| d.split).collect();
        assert!(splits.contains(&"train"));
        assert!(splits.contains(&"val"));
        assert_eq!(DEFAULT_DIR_SPECS.len(), 4);
    }

    #[test]
    fn test_resolve_weights_prefers_override() {
        let config = Config {
            database_url: String::new(),
            data_root: PathBuf::new(),
            models_dir: PathBuf::from("does-not-exist"),
            weights_override: Some(PathBuf::from("custom.onnx")),
            runs_dir: PathBuf::new(),
            trainer_command: String::new(),
            listen_addr: String::new(),
        };
        assert_eq!(config.resolve_weights(), Some(PathBuf::from("custom.onnx")));
    }
}
