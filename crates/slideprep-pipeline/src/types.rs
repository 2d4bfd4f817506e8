//! Shared types for the slideprep resolution pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Known magnification and physical pixel size of a tissue class's
/// true full-resolution source.
///
/// Values are independent of any on-disk tier; they describe the
/// scanner output the tiers were resized from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueCalibration {
    /// Tissue class name (e.g. `kidney`, `lung-lesion`). Unique within
    /// a calibration table.
    pub tissue_name: String,

    /// Objective magnification of the full-resolution source.
    pub base_magnification: f64,

    /// Physical pixel width of the full-resolution source, in µm.
    pub base_pixel_width_um: f64,

    /// Physical pixel height of the full-resolution source, in µm.
    pub base_pixel_height_um: f64,
}

impl TissueCalibration {
    /// Create a calibration with equal pixel width and height.
    #[must_use]
    pub fn square(tissue_name: impl Into<String>, magnification: f64, pixel_size_um: f64) -> Self {
        Self {
            tissue_name: tissue_name.into(),
            base_magnification: magnification,
            base_pixel_width_um: pixel_size_um,
            base_pixel_height_um: pixel_size_um,
        }
    }
}

/// One on-disk resized copy of a tissue's image set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleTier {
    /// Directory holding this tier's images.
    pub directory_path: PathBuf,

    /// Downscale percentage encoded in the directory name, relative to
    /// the full-resolution source.
    pub scale_percent: f64,
}

/// Magnification and pixel size back-calculated for a selected tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedResolution {
    /// True magnification of the tier's images.
    pub effective_magnification: f64,

    /// True physical pixel width of the tier's images, in µm.
    pub effective_pixel_width_um: f64,

    /// True physical pixel height of the tier's images, in µm.
    pub effective_pixel_height_um: f64,
}

/// Result of one external conversion invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Image the tool was run on.
    pub image_path: PathBuf,

    /// Whether the tool exited with code 0.
    pub succeeded: bool,

    /// Exit code, or `None` when the process was terminated by a signal
    /// or could not be spawned at all.
    pub exit_code: Option<i32>,

    /// Captured standard error. For spawn failures this holds the spawn
    /// error message instead.
    pub stderr_text: String,
}

impl ConversionOutcome {
    /// Build an outcome from a finished process's exit code and stderr.
    #[must_use]
    pub fn from_exit(image_path: PathBuf, exit_code: Option<i32>, stderr_text: String) -> Self {
        Self {
            image_path,
            succeeded: exit_code == Some(0),
            exit_code,
            stderr_text,
        }
    }
}

/// Format a float in shortest round-trip form, always keeping at least
/// one fractional digit (`40.0`, `0.2528`).
///
/// Used everywhere values reach a human or a script so that whole
/// numbers stay recognisably floating-point.
#[must_use]
pub fn format_decimal(value: f64) -> String {
    format!("{value:?}")
}

/// Errors from the calibration registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// No calibration is registered under this tissue name.
    #[error("unknown tissue '{0}': no calibration registered")]
    UnknownTissue(String),

    /// A calibration table entry is unusable.
    #[error("invalid calibration for tissue '{tissue}': {reason}")]
    InvalidCalibration {
        /// Offending tissue name.
        tissue: String,
        /// What is wrong with the entry.
        reason: String,
    },
}

/// Errors from parsing a tier directory name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TierNameError {
    /// The name does not contain `scale-<digits>(.<digits>)?`.
    #[error("directory name '{0}' does not embed a scale percentage (expected 'scale-<percent>')")]
    MissingPercentage(String),

    /// The name is not valid UTF-8.
    #[error("directory name '{0}' is not valid UTF-8")]
    NonUtf8(String),
}

/// A tissue directory name does not follow `<tissue>_<index>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tissue directory name '{0}' does not match '<tissue>_<index>'")]
pub struct TissueNameError(pub String);

/// Errors from resolution derivation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    /// The tier's scale percentage is zero, negative or not finite.
    #[error("invalid scale percentage {0}: must be finite and greater than zero")]
    InvalidScale(f64),
}
