//! Ingest command - catalogs dataset files into the database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::DirEntrySpec;
use database::{FileType, NewCatalogEntry, Store};

/// Counters from one ingest pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    pub considered: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Runs the ingest command: walks each configured directory under the
/// data root and upserts one catalog row per matching file.
///
/// A rerun over the same tree inserts nothing; existing rows are counted
/// as skipped.
///
/// # Errors
///
/// Returns an error if a directory walk or a database write fails.
pub async fn run(
    store: &dyn Store,
    data_root: &Path,
    specs: &[DirEntrySpec],
) -> Result<IngestSummary> {
    println!("Cataloging dataset files under: {}", data_root.display());

    let mut summary = IngestSummary::default();

    for spec in specs {
        let dir = data_root.join(spec.rel_dir);
        if !dir.is_dir() {
            println!("  missing directory, skipping: {}", dir.display());
            continue;
        }

        let file_type = match spec.file_type {
            "annotation" => FileType::Annotation,
            _ => FileType::Image,
        };

        let files = collect_files(&dir, file_type)
            .with_context(|| format!("failed to walk {}", dir.display()))?;
        println!(
            "  {} {} files under {}",
            files.len(),
            file_type.as_str(),
            spec.rel_dir
        );

        for path in files {
            summary.considered += 1;
            tracing::debug!(file = %path.display(), considered = summary.considered, "cataloging");

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            // Paths are stored relative to the data root with forward
            // slashes regardless of platform.
            let rel_path = path
                .strip_prefix(data_root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let inserted = store
                .upsert_catalog_entry(NewCatalogEntry {
                    split: spec.split.to_string(),
                    file_type: file_type.as_str().to_string(),
                    filename,
                    rel_path,
                    abs_path: path.to_string_lossy().to_string(),
                })
                .await?;

            if inserted {
                summary.inserted += 1;
            } else {
                summary.skipped += 1;
            }
        }
    }

    let total = store.count_catalog_entries().await?;
    println!(
        "Ingestion complete: {} considered, {} inserted, {} skipped, {} total rows",
        summary.considered, summary.inserted, summary.skipped, total
    );

    Ok(summary)
}

/// Finds all files of one type in a directory (recursively).
fn collect_files(dir: &Path, file_type: FileType) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if file_type.matches_filename(name) {
                    files.push(path);
                }
            }
        } else if path.is_dir() {
            files.extend(collect_files(&path, file_type)?);
        }
    }

    files.sort();
    Ok(files)
}
