//! slideprep-pipeline: Pure resolution pipeline (sans-IO).
//!
//! Works out, for one tissue, which on-disk tier is the full-resolution
//! reference and what its true magnification and pixel size are:
//! tier-name parsing -> reference selection -> calibration lookup ->
//! resolution derivation -> script templating -> provenance text.
//!
//! This crate has **no I/O dependencies** -- it operates on names,
//! numbers and strings. All filesystem and process interaction lives in
//! `slideprep-io`.

pub mod provenance;
pub mod registry;
pub mod resolution;
pub mod template;
pub mod tier;
pub mod types;

pub use provenance::{AdditionalMetadata, METADATA_FILE_NAME, SUMMARY_FILE_NAME};
pub use registry::{CalibrationTable, TissueRegistry};
pub use resolution::derive;
pub use template::{PlaceholderRenderer, RenderError, TemplateParams, TemplateRenderer};
pub use tier::{parse_scale_percent, parse_tissue_name, select_reference};
pub use types::{
    CalibrationError, ConversionOutcome, DerivedResolution, ResolutionError, ScaleTier,
    TierNameError, TissueCalibration, TissueNameError,
};
