use anyhow::{Context, Result};
use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Compute SHA256 hash of path + "\n" + content (direnv style)
pub fn compute_hash(path: &Path, content: &str) -> String {
    let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let input = format!("{}\n{}", canonical_path.display(), content);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Directory holding one file per approved configuration
fn get_approval_dir() -> Result<PathBuf> {
    // XDG_DATA_HOME wins on every platform
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg_data_home).join("snipcheck").join("allow"));
    }

    let proj_dirs = ProjectDirs::from("", "", "snipcheck")
        .context("Failed to determine project directories")?;
    Ok(proj_dirs.data_dir().join("allow"))
}

fn approval_file(config_path: &Path) -> Result<PathBuf> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let hash = compute_hash(config_path, &content);
    Ok(get_approval_dir()?.join(hash))
}

/// Check if the current content of a configuration file is approved
pub fn is_approved(config_path: &Path) -> Result<bool> {
    Ok(approval_file(config_path)?.exists())
}

/// Approve the current content of a configuration file
pub fn approve(config_path: &Path) -> Result<()> {
    let approval_file = approval_file(config_path)?;
    let approval_dir = get_approval_dir()?;

    fs::create_dir_all(&approval_dir).with_context(|| {
        format!(
            "Failed to create approval directory: {}",
            approval_dir.display()
        )
    })?;

    // The file records which configuration it approves, for `list`
    let canonical_path = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    fs::write(&approval_file, canonical_path.display().to_string())
        .with_context(|| format!("Failed to write approval file: {}", approval_file.display()))?;

    Ok(())
}

/// Remove the approval for a configuration file
pub fn deny(config_path: &Path) -> Result<()> {
    let approval_file = approval_file(config_path)?;

    if approval_file.exists() {
        fs::remove_file(&approval_file).with_context(|| {
            format!(
                "Failed to remove approval file: {}",
                approval_file.display()
            )
        })?;
    }

    Ok(())
}

/// List the paths of all approved configurations
pub fn list_approved() -> Result<Vec<String>> {
    let approval_dir = get_approval_dir()?;

    if !approval_dir.exists() {
        return Ok(vec![]);
    }

    let mut approved = Vec::new();
    for entry in fs::read_dir(&approval_dir).with_context(|| {
        format!(
            "Failed to read approval directory: {}",
            approval_dir.display()
        )
    })? {
        let entry = entry?;
        if entry.path().is_file() {
            if let Ok(path_content) = fs::read_to_string(entry.path()) {
                approved.push(path_content);
            }
        }
    }
    approved.sort();

    Ok(approved)
}
