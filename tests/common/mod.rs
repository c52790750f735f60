//! Common test utilities for integration tests
//!
//! This module contains shared test fixtures and helper functions used across
//! integration tests. These utilities are not compiled into the library.

#![allow(dead_code)]

use anyhow::Result;
use snipcheck::{check_files, discover, CheckerRegistry, RunSummary, SnipcheckConfig, Validator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Isolated test fixture with automatic cleanup
///
/// Creates a temporary copy of a fixture directory, allowing tests to run
/// in parallel without interfering with each other.
pub struct TestFixture {
    _dir: TempDir,
    root: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture from a specific source directory
    pub fn new(source: impl AsRef<Path>) -> Result<Self> {
        let dir = TempDir::new()?;
        copy_dir_all(source.as_ref(), dir.path())?;

        Ok(Self {
            root: dir.path().to_path_buf(),
            _dir: dir,
        })
    }

    /// Get the path to the fixture root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the fixture's snipcheck.toml, or the defaults when it has none
    pub fn config(&self) -> Result<SnipcheckConfig> {
        let path = self.root.join(snipcheck::CONFIG_FILE_NAME);
        if path.is_file() {
            SnipcheckConfig::load(&path)
        } else {
            Ok(SnipcheckConfig::default())
        }
    }

    /// Discover and check every document of the fixture
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with_jobs(2).await
    }

    pub async fn run_with_jobs(&self, jobs: usize) -> Result<RunSummary> {
        let config = self.config()?;
        let files = discover(&[self.root.clone()], &config.check.extensions)?;
        let validator = Arc::new(Validator::new(CheckerRegistry::from_config(&config)));
        check_files(files, validator, jobs).await
    }
}

/// Recursively copy all files and directories from src to dst
fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    std::fs::create_dir_all(&dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir_all(entry.path(), dst.as_ref().join(entry.file_name()))?;
        } else {
            std::fs::copy(entry.path(), dst.as_ref().join(entry.file_name()))?;
        }
    }
    Ok(())
}
