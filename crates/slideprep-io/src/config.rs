//! Run configuration and calibration-table loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slideprep_pipeline::CalibrationTable;

use crate::error::PrepareError;

/// Locations and policy for a dataset run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Directory holding template sources. `None` uses the templates
    /// compiled into the binary.
    pub templates_dir: Option<PathBuf>,

    /// Directory rendered scripts are cached in. Must differ from
    /// `templates_dir`.
    pub scripts_dir: PathBuf,

    /// File name of the template inside `templates_dir`.
    pub template_name: String,

    /// Record a failed tissue and continue with the next one instead of
    /// halting the run.
    pub keep_going: bool,
}

impl PrepareConfig {
    /// Default dataset root.
    pub const DEFAULT_DATASET_ROOT: &'static str = "/data/dataset_ANHIR/images";

    /// Name of the rendered-script directory.
    pub const SCRIPTS_DIR_NAME: &'static str = "scripts";

    /// Default template: export the image as a pyramidal OME-TIFF.
    pub const DEFAULT_TEMPLATE_NAME: &'static str = "export_image_as_tiff.groovy.jinja2";
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            scripts_dir: default_scripts_dir(),
            template_name: Self::DEFAULT_TEMPLATE_NAME.to_owned(),
            keep_going: false,
        }
    }
}

/// Default script cache location: `<user cache dir>/slideprep/scripts`
/// (e.g. `~/.cache/slideprep/scripts` on Linux), independent of the
/// working directory so the cache is shared across runs.
///
/// Falls back to `scripts` in the working directory when the platform
/// reports no cache directory.
#[must_use]
pub fn default_scripts_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(
        || PathBuf::from(PrepareConfig::SCRIPTS_DIR_NAME),
        |cache| cache.join("slideprep").join(PrepareConfig::SCRIPTS_DIR_NAME),
    )
}

/// Load a calibration table from a JSON array file.
///
/// # Errors
///
/// Returns [`PrepareError::CalibrationRead`] if the file cannot be read
/// and [`PrepareError::CalibrationParse`] if it is not a valid table.
pub fn load_calibration_table(path: &Path) -> Result<CalibrationTable, PrepareError> {
    let text = fs::read_to_string(path).map_err(|source| PrepareError::CalibrationRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PrepareError::CalibrationParse {
        path: path.to_path_buf(),
        source,
    })
}
