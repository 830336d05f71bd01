//! Drone-Imagery Object Detection Demo
//!
//! Upload drone photos, run a pretrained detection model over them and
//! view the annotated results, with images, logs and training runs
//! persisted to a relational database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{Config, DEFAULT_DIR_SPECS};
use database::{PgStore, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vision::{
    InferenceService, LabelMap, LazyDetector, ObjectDetector, ProcessTrainer, VisionError,
};

use dronelens::commands;
use dronelens::server::{self, AppState};

/// Drone-Imagery Object Detection Demo
#[derive(Parser)]
#[command(name = "dronelens")]
#[command(about = "Object detection demo for drone photography")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Catalog dataset files into the database
    Ingest {
        /// Dataset root; defaults to DATA_ROOT from the environment
        #[arg(short, long)]
        data_root: Option<PathBuf>,
    },

    /// Run detection over local image files
    Detect {
        /// Image files to process
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Inference resolution
        #[arg(long, default_value = "640")]
        imgsz: u32,

        /// Minimum confidence to keep a box
        #[arg(long, default_value = "0.25")]
        conf: f32,

        /// Comma-separated labels to keep (default: all)
        #[arg(long)]
        classes: Option<String>,

        /// Directory for annotated images and the CSV table
        #[arg(short, long, default_value = "detections")]
        out_dir: PathBuf,
    },

    /// Run one training run through the external trainer
    Train {
        /// Base model or weights to start from
        #[arg(short, long, default_value = "yolov8n.pt")]
        model: String,

        /// Dataset config handed to the trainer
        #[arg(short, long, default_value = "config/visdrone.yaml")]
        data_yaml: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "50")]
        epochs: i32,

        /// Training image size
        #[arg(long, default_value = "640")]
        imgsz: i32,

        /// Batch size
        #[arg(short, long, default_value = "16")]
        batch: i32,

        /// Initial learning rate
        #[arg(long, default_value = "0.01")]
        lr0: f32,
    },

    /// Serve the upload-and-detect front end
    Serve {
        /// Bind address; defaults to LISTEN_ADDR from the environment
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url).await?;

    match cli.command {
        Commands::Ingest { data_root } => {
            let root = data_root.unwrap_or_else(|| config.data_root.clone());
            commands::ingest::run(&store, &root, DEFAULT_DIR_SPECS).await?;
        }
        Commands::Detect {
            images,
            imgsz,
            conf,
            classes,
            out_dir,
        } => {
            let inference = build_inference(&config);
            let args = commands::detect::DetectArgs {
                images,
                imgsz,
                conf,
                labels: classes.map(|text| {
                    text.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                }),
                out_dir,
            };
            commands::detect::run(&store, &inference, &args).await?;
        }
        Commands::Train {
            model,
            data_yaml,
            epochs,
            imgsz,
            batch,
            lr0,
        } => {
            let trainer = ProcessTrainer::new(config.trainer_command.clone());
            let args = commands::train::TrainArgs {
                model_name: model,
                data_yaml,
                epochs,
                imgsz,
                batch,
                lr0,
            };
            let run_id = commands::train::run(&store, &trainer, &config.runs_dir, &args).await?;
            info!(run_id, "training run recorded");
        }
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            let inference = build_inference(&config);
            let state = AppState::new(Arc::new(store) as Arc<dyn Store>, inference);
            server::serve(&addr, state).await?;
        }
        Commands::Migrate => {
            store.migrate().await?;
            info!("Migrations completed successfully");
        }
    }

    Ok(())
}

/// Wires the detector behind a lazy loader so commands that never run
/// inference do not pay for model startup.
fn build_inference(config: &Config) -> Arc<InferenceService> {
    let weights = config.resolve_weights();
    let detector = LazyDetector::new(move || build_detector(weights.as_deref()));
    Arc::new(InferenceService::new(
        Arc::new(detector),
        LabelMap::coarse(),
    ))
}

#[cfg(feature = "onnx")]
fn build_detector(weights: Option<&Path>) -> Result<Box<dyn ObjectDetector>, VisionError> {
    let path = weights.ok_or_else(|| {
        VisionError::Model(
            "no detection weights found; set WEIGHTS_PATH or place a model under MODELS_DIR"
                .to_string(),
        )
    })?;
    Ok(Box::new(vision::YoloOnnx::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn build_detector(_weights: Option<&Path>) -> Result<Box<dyn ObjectDetector>, VisionError> {
    Err(VisionError::Model(
        "built without a detection backend; rebuild with the onnx feature".to_string(),
    ))
}
