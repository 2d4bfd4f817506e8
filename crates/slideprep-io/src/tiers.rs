//! Directory scanning: tissue directories, scale tiers, and tier images.

use std::fs;
use std::path::{Path, PathBuf};

use slideprep_pipeline::{ScaleTier, TierNameError, parse_scale_percent, select_reference};
use tracing::debug;

use crate::error::PrepareError;

/// Find the tier directory with the largest scale percentage.
///
/// Non-directory entries are skipped. Every directory entry must embed a
/// percentage; a single unparseable directory fails the whole scan so
/// the reference tier is never chosen from a partial view. Ties keep the
/// first maximum in listing order, which is filesystem-dependent.
///
/// # Errors
///
/// - [`PrepareError::ReadDir`] if the directory cannot be listed.
/// - [`PrepareError::MalformedTierName`] if a subdirectory has no
///   embedded percentage.
/// - [`PrepareError::NoTierFound`] if there are no subdirectories.
pub fn find_reference_tier(tissue_dir: &Path) -> Result<ScaleTier, PrepareError> {
    let mut candidates = Vec::new();
    for path in read_dir_paths(tissue_dir)? {
        if !path.is_dir() {
            continue;
        }
        let scale_percent = tier_percent(&path).map_err(|source| {
            PrepareError::MalformedTierName {
                dir: path.clone(),
                source,
            }
        })?;
        debug!(tier = %path.display(), scale_percent, "found scale tier");
        candidates.push(ScaleTier {
            directory_path: path,
            scale_percent,
        });
    }

    select_reference(candidates).ok_or_else(|| PrepareError::NoTierFound {
        dir: tissue_dir.to_path_buf(),
    })
}

fn tier_percent(path: &Path) -> Result<f64, TierNameError> {
    let name = path.file_name().unwrap_or_default();
    let name = name
        .to_str()
        .ok_or_else(|| TierNameError::NonUtf8(name.to_string_lossy().into_owned()))?;
    parse_scale_percent(name)
}

/// Regular files in a tier directory, sorted by file name.
///
/// # Errors
///
/// Returns [`PrepareError::ReadDir`] if the directory cannot be listed.
pub fn list_images(tier_dir: &Path) -> Result<Vec<PathBuf>, PrepareError> {
    let mut images: Vec<PathBuf> = read_dir_paths(tier_dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();
    images.sort();
    Ok(images)
}

/// Subdirectories of the dataset root, sorted by name.
///
/// # Errors
///
/// Returns [`PrepareError::ReadDir`] if the root cannot be listed.
pub fn list_tissue_dirs(dataset_root: &Path) -> Result<Vec<PathBuf>, PrepareError> {
    let mut dirs: Vec<PathBuf> = read_dir_paths(dataset_root)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Entries of `dir` in listing order.
fn read_dir_paths(dir: &Path) -> Result<Vec<PathBuf>, PrepareError> {
    let read_dir_error = |source| PrepareError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    fs::read_dir(dir)
        .map_err(read_dir_error)?
        .map(|entry| entry.map(|e| e.path()).map_err(read_dir_error))
        .collect()
}
