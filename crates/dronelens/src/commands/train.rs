//! Train command - drives one training run end to end.
//!
//! The run row is created before the trainer starts so its id can name
//! the output directory, and every lifecycle event lands in `app_logs`
//! tagged with that id.

use std::path::Path;

use anyhow::{Context, Result};
use database::models::NewLogEntry;
use database::{append_log_best_effort, NewTrainRun, Store, TrainRunFinish};
use tracing::info;
use vision::{TrainSpec, TrainerBackend};

const LOG_SOURCE: &str = "train";

/// Hyperparameters for one run, defaults matching the baseline recipe.
#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub model_name: String,
    pub data_yaml: String,
    pub epochs: i32,
    pub imgsz: i32,
    pub batch: i32,
    pub lr0: f32,
}

impl Default for TrainArgs {
    fn default() -> Self {
        Self {
            model_name: "yolov8n.pt".to_string(),
            data_yaml: "config/visdrone.yaml".to_string(),
            epochs: 50,
            imgsz: 640,
            batch: 16,
            lr0: 0.01,
        }
    }
}

/// Runs the train command and returns the run id.
///
/// On success the run row is marked finished with the weights path. On
/// trainer failure the error is logged against the run and re-raised;
/// the row stays unfinished as a visible record of the attempt.
///
/// # Errors
///
/// Returns an error if run bookkeeping or the trainer itself fails.
pub async fn run(
    store: &dyn Store,
    trainer: &dyn TrainerBackend,
    runs_dir: &Path,
    args: &TrainArgs,
) -> Result<i64> {
    let run_id = store
        .insert_train_run(NewTrainRun {
            model_name: args.model_name.clone(),
            data_yaml: args.data_yaml.clone(),
            epochs: args.epochs,
            imgsz: args.imgsz,
            batch: args.batch,
            lr0: args.lr0,
            train_imgs: None,
            val_imgs: None,
            notes: None,
        })
        .await
        .context("failed to create training run record")?;

    let run_name = format!("run_{run_id}");
    info!(run_id, model = args.model_name, epochs = args.epochs, "starting training run");

    append_log_best_effort(
        store,
        NewLogEntry::info(
            LOG_SOURCE,
            format!(
                "training started: model={} epochs={} imgsz={} batch={} lr0={}",
                args.model_name, args.epochs, args.imgsz, args.batch, args.lr0
            ),
        )
        .with_run_id(run_id),
    )
    .await;

    let spec = TrainSpec {
        model_name: args.model_name.clone(),
        data_yaml: args.data_yaml.clone().into(),
        epochs: args.epochs,
        imgsz: args.imgsz,
        batch: args.batch,
        lr0: args.lr0,
        project_dir: runs_dir.to_path_buf(),
        run_name,
    };

    let outcome = match trainer.train(&spec) {
        Ok(outcome) => outcome,
        Err(e) => {
            append_log_best_effort(
                store,
                NewLogEntry::error(LOG_SOURCE, "training failed", format!("{e:?}"))
                    .with_run_id(run_id),
            )
            .await;
            return Err(e).context(format!("training run {run_id} failed"));
        }
    };

    let weights_path = outcome.weights_path.to_string_lossy().to_string();
    store
        .finish_train_run(
            run_id,
            TrainRunFinish {
                weights_path: Some(weights_path.clone()),
                best_map50: outcome.best_map50,
                best_map5095: outcome.best_map5095,
            },
        )
        .await
        .context("failed to mark training run finished")?;

    append_log_best_effort(
        store,
        NewLogEntry::info(
            LOG_SOURCE,
            format!("training finished, weights at {weights_path}"),
        )
        .with_run_id(run_id),
    )
    .await;

    info!(run_id, weights_path, "training run complete");
    Ok(run_id)
}
