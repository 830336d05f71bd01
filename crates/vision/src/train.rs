//! The training-model boundary.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{VisionError, VisionResult};

/// Hyperparameters and output placement for one training run.
#[derive(Debug, Clone)]
pub struct TrainSpec {
    /// Base model or weights to start from, e.g. `yolov8n.pt`.
    pub model_name: String,
    /// Dataset config path handed to the trainer.
    pub data_yaml: PathBuf,
    pub epochs: i32,
    pub imgsz: i32,
    pub batch: i32,
    pub lr0: f32,
    /// Directory run artifacts are written under.
    pub project_dir: PathBuf,
    /// Run-scoped subdirectory name, e.g. `run_12`.
    pub run_name: String,
}

/// What a completed training run produced.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub weights_path: PathBuf,
    pub best_map50: Option<f32>,
    pub best_map5095: Option<f32>,
}

/// Computes where the trainer leaves its best weights for a run.
#[must_use]
pub fn expected_weights_path(project_dir: &Path, run_name: &str) -> PathBuf {
    project_dir.join(run_name).join("weights").join("best.pt")
}

/// A model training routine.
pub trait TrainerBackend: Send + Sync {
    /// Runs training to completion, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the training routine fails.
    fn train(&self, spec: &TrainSpec) -> VisionResult<TrainOutcome>;
}

/// Trainer that shells out to an external training command in the
/// ultralytics CLI argument style.
pub struct ProcessTrainer {
    program: String,
}

impl ProcessTrainer {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TrainerBackend for ProcessTrainer {
    fn train(&self, spec: &TrainSpec) -> VisionResult<TrainOutcome> {
        tracing::info!(
            program = self.program,
            model = spec.model_name,
            epochs = spec.epochs,
            run_name = spec.run_name,
            "invoking external trainer"
        );

        let output = Command::new(&self.program)
            .arg("detect")
            .arg("train")
            .arg(format!("model={}", spec.model_name))
            .arg(format!("data={}", spec.data_yaml.display()))
            .arg(format!("epochs={}", spec.epochs))
            .arg(format!("imgsz={}", spec.imgsz))
            .arg(format!("batch={}", spec.batch))
            .arg(format!("lr0={}", spec.lr0))
            .arg(format!("project={}", spec.project_dir.display()))
            .arg(format!("name={}", spec.run_name))
            .output()
            .map_err(|e| VisionError::Train(format!("failed to launch {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisionError::Train(format!(
                "trainer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // Metrics are not extracted from the trainer output; the run row
        // keeps them NULL unless filled in later.
        Ok(TrainOutcome {
            weights_path: expected_weights_path(&spec.project_dir, &spec.run_name),
            best_map50: None,
            best_map5095: None,
        })
    }
}
