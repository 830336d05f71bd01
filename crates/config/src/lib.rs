//! Environment configuration for the dronelens workspace.

mod config;

pub use config::{default_data_root, Config, DirEntrySpec, DEFAULT_DIR_SPECS};
