//! Provenance and failure-log rendering (sans-IO).
//!
//! Produces the text of the per-tissue summary, the per-tissue metadata
//! record, and the per-image failure log. Writing them to disk is the
//! job of `slideprep-io`.

use std::fmt::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{ConversionOutcome, DerivedResolution, ScaleTier, TissueCalibration, format_decimal};

/// File name of the human-readable tissue summary. Its presence marks a
/// tissue as already processed.
pub const SUMMARY_FILE_NAME: &str = "README.md";

/// File name of the structured tissue metadata record.
pub const METADATA_FILE_NAME: &str = "additional_metadata.json";

/// Suffix appended to an image's base name to form its failure log name.
pub const FAILURE_LOG_SUFFIX: &str = "_process.log";

/// Structured metadata read by the viewer when importing a tissue's
/// whole-slide images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdditionalMetadata {
    /// Derived magnification of the converted tier.
    pub mag: f64,
}

impl From<&DerivedResolution> for AdditionalMetadata {
    fn from(derived: &DerivedResolution) -> Self {
        Self {
            mag: derived.effective_magnification,
        }
    }
}

/// Render the Markdown summary for a processed tissue.
///
/// Lists the declared base calibration, then the derived values with the
/// arithmetic that produced them.
#[must_use]
pub fn render_summary(
    tissue_name: &str,
    calibration: &TissueCalibration,
    tier: &ScaleTier,
    derived: &DerivedResolution,
) -> String {
    let m = format_decimal(calibration.base_magnification);
    let x = format_decimal(calibration.base_pixel_width_um);
    let y = format_decimal(calibration.base_pixel_height_um);
    let p = format_decimal(tier.scale_percent);
    let mag = format_decimal(derived.effective_magnification);

    let mut out = String::new();
    let _ = writeln!(out, "# {}", tissue_name.to_uppercase());
    let _ = writeln!(out);
    let _ = writeln!(out, "## ANHIR specifications");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Magnification: {m}");
    let _ = writeln!(out, "- Pixel Width [µm]: {x}");
    let _ = writeln!(out, "- Pixel Height [µm]: {y}");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Real values (for the full resolution)");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Magnification ({p} * {m} / 100): {mag}");
    let _ = writeln!(
        out,
        "- Pixel Width [µm]: ({x} * {m} / {mag}): {}",
        format_decimal(derived.effective_pixel_width_um),
    );
    let _ = writeln!(
        out,
        "- Pixel Height [µm]: ({y} * {m} / {mag}): {}",
        format_decimal(derived.effective_pixel_height_um),
    );
    out
}

/// Failure log file name for an image: the file name up to its first
/// `.`, followed by [`FAILURE_LOG_SUFFIX`].
///
/// `S1.ome.jpg` gives `S1_process.log`. Images sharing that prefix
/// (`S1.jpg` and `S1.png`) share a log; the later failure overwrites
/// the earlier one.
#[must_use]
pub fn failure_log_name(image_path: &Path) -> String {
    let file_name = image_path
        .file_name()
        .map_or_else(|| image_path.to_string_lossy(), |n| n.to_string_lossy());
    let base = file_name.split('.').next().unwrap_or_default();
    format!("{base}{FAILURE_LOG_SUFFIX}")
}

/// Render the contents of a failure log for an unsuccessful outcome.
#[must_use]
pub fn render_failure_log(outcome: &ConversionOutcome) -> String {
    let code = outcome
        .exit_code
        .map_or_else(|| "none".to_owned(), |c| c.to_string());
    format!(
        "Command failed!\nReturn code: {code}\n\n{}",
        outcome.stderr_text
    )
}
