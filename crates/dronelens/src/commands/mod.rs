//! CLI command implementations.

pub mod detect;
pub mod ingest;
pub mod train;
