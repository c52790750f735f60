use crate::error::LoadError;
use crate::loader::parse_document;
use crate::validator::{ValidationReport, Validator};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::{DirEntry, WalkDir};

/// Expands the given paths into the list of documents to check.
///
/// Files are taken as-is. Directories are walked recursively, skipping hidden
/// entries and without following symlinks, and contribute files whose
/// extension is in `extensions`. Entries of each directory are visited in
/// name order.
pub fn discover(paths: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            walk_dir(path, extensions, &mut files)?;
        } else {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
    }
    Ok(files)
}

fn walk_dir(dir: &Path, extensions: &[String], files: &mut Vec<PathBuf>) -> Result<()> {
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry =
            entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Outcome of loading and validating one document.
#[derive(Debug)]
pub struct DocumentResult {
    pub path: PathBuf,
    pub outcome: std::result::Result<ValidationReport, LoadError>,
    pub duration: Duration,
}

/// Outcome of a whole run, documents in input order.
#[derive(Debug)]
pub struct RunSummary {
    pub documents: Vec<DocumentResult>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn load_failures(&self) -> impl Iterator<Item = &LoadError> {
        self.documents.iter().filter_map(|doc| doc.outcome.as_ref().err())
    }

    pub fn reports(&self) -> impl Iterator<Item = &ValidationReport> {
        self.documents.iter().filter_map(|doc| doc.outcome.as_ref().ok())
    }

    pub fn checked_blocks(&self) -> usize {
        self.reports().map(|r| r.entries.len()).sum()
    }

    pub fn skipped_blocks(&self) -> usize {
        self.reports().map(|r| r.skipped).sum()
    }

    pub fn syntax_failures(&self) -> usize {
        self.reports().map(|r| r.failures().count()).sum()
    }

    /// Number of passing blocks per language tag.
    pub fn passed_by_language(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for report in self.reports() {
            for entry in &report.entries {
                if entry.outcome == crate::validator::Outcome::Passed {
                    *counts.entry(entry.language.as_str()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    pub fn is_success(&self) -> bool {
        self.load_failures().next().is_none() && self.syntax_failures() == 0
    }
}

/// Loads and validates `files` with at most `jobs` documents in flight.
///
/// Each document is read with `tokio::fs` and parsed and validated on the
/// blocking pool. A document that fails to load is recorded in its
/// [`DocumentResult`] and does not stop the run.
pub async fn check_files(
    files: Vec<PathBuf>,
    validator: Arc<Validator>,
    jobs: usize,
) -> Result<RunSummary> {
    let start = Instant::now();
    log::info!(
        "Checking {} document(s) with {} job(s)",
        files.len(),
        jobs.max(1)
    );

    let documents: Vec<DocumentResult> = stream::iter(files)
        .map(|path| check_file(path, Arc::clone(&validator)))
        .buffered(jobs.max(1))
        .try_collect()
        .await?;

    Ok(RunSummary {
        documents,
        elapsed: start.elapsed(),
    })
}

async fn check_file(path: PathBuf, validator: Arc<Validator>) -> Result<DocumentResult> {
    let start = Instant::now();

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(source) => {
            log::debug!("Failed to read {}: {}", path.display(), source);
            return Ok(DocumentResult {
                outcome: Err(LoadError::Io {
                    path: path.clone(),
                    source,
                }),
                path,
                duration: start.elapsed(),
            });
        }
    };

    let task_path = path.clone();
    let outcome = tokio::task::spawn_blocking(move || -> std::result::Result<_, LoadError> {
        let document = parse_document(&task_path, &raw).map_err(|source| LoadError::Parse {
            path: task_path.clone(),
            source,
        })?;
        log::info!("Checking document: {}", task_path.display());
        Ok(validator.validate(&document))
    })
    .await
    .with_context(|| format!("Validation task for {} panicked", path.display()))?;

    if let Err(err) = &outcome {
        log::debug!("{}: {}", err, error_source(err));
    }

    Ok(DocumentResult {
        path,
        outcome,
        duration: start.elapsed(),
    })
}

fn error_source(err: &LoadError) -> String {
    match err {
        LoadError::Io { source, .. } => source.to_string(),
        LoadError::Parse { source, .. } => source.to_string(),
    }
}
