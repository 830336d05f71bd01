//! Drone-imagery detection demo application.
//!
//! Command-line surface (ingest, detect, train, migrate) plus a small
//! web front end for uploading photos and viewing annotated results.
//! Persistence goes through the `database` crate, model calls through
//! the `vision` crate.

pub mod batch;
pub mod commands;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;
