//! Per-tissue provenance files.
//!
//! The summary file doubles as the resume sentinel: a tissue directory
//! containing it is skipped by later runs.

use std::path::Path;

use slideprep_pipeline::provenance::render_summary;
use slideprep_pipeline::{
    AdditionalMetadata, DerivedResolution, METADATA_FILE_NAME, SUMMARY_FILE_NAME, ScaleTier,
    TissueCalibration,
};

use crate::atomic;
use crate::error::PrepareError;

/// Whether `tissue_dir` already carries the provenance sentinel, a
/// regular summary file.
#[must_use]
pub fn is_processed(tissue_dir: &Path) -> bool {
    tissue_dir.join(SUMMARY_FILE_NAME).is_file()
}

/// Write the metadata record and summary into `tissue_dir`,
/// overwriting earlier versions.
///
/// The metadata record is written first so the sentinel never exists
/// without it. Both files are replaced atomically, so a failed write
/// never leaves a partial sentinel.
///
/// # Errors
///
/// Returns [`PrepareError::ProvenancePersist`] if either file cannot be
/// written.
pub fn write(
    tissue_dir: &Path,
    tissue_name: &str,
    calibration: &TissueCalibration,
    tier: &ScaleTier,
    derived: &DerivedResolution,
) -> Result<(), PrepareError> {
    let metadata = serde_json::to_string(&AdditionalMetadata::from(derived))
        .map_err(PrepareError::MetadataEncode)?;
    write_file(&tissue_dir.join(METADATA_FILE_NAME), &metadata)?;

    let summary = render_summary(tissue_name, calibration, tier, derived);
    write_file(&tissue_dir.join(SUMMARY_FILE_NAME), &summary)
}

fn write_file(path: &Path, contents: &str) -> Result<(), PrepareError> {
    atomic::write(path, contents).map_err(|source| PrepareError::ProvenancePersist {
        path: path.to_path_buf(),
        source,
    })
}
