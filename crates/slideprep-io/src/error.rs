//! Error type for dataset preparation.

use std::io;
use std::path::PathBuf;

use slideprep_pipeline::{
    CalibrationError, RenderError, ResolutionError, TierNameError, TissueNameError,
};

/// Errors that can occur while preparing a tissue or the whole dataset.
///
/// Every variant is fatal for the tissue it is raised on. Per-image
/// conversion failures are not errors; they are reported as
/// unsuccessful [`ConversionOutcome`](slideprep_pipeline::ConversionOutcome)s.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    /// Calibration lookup or table validation failed.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// A tissue directory name does not identify a tissue class.
    #[error(transparent)]
    MalformedTissueName(#[from] TissueNameError),

    /// A tier directory name does not embed a scale percentage.
    #[error("malformed tier directory {}: {source}", .dir.display())]
    MalformedTierName {
        /// The offending directory.
        dir: PathBuf,
        /// Why the name did not parse.
        source: TierNameError,
    },

    /// A tissue directory contains no tier directories.
    #[error("no scale tier directories found in {}", .dir.display())]
    NoTierFound {
        /// The tissue directory that was scanned.
        dir: PathBuf,
    },

    /// The selected tier's percentage cannot be used.
    #[error(transparent)]
    InvalidScale(#[from] ResolutionError),

    /// The named template source does not exist.
    #[error("template not found: {}", .path.display())]
    TemplateNotFound {
        /// Where the template was expected.
        path: PathBuf,
    },

    /// The template source exists but could not be read.
    #[error("failed to read template {}: {source}", .path.display())]
    TemplateRead {
        /// The template file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Template rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The rendered script could not be written.
    #[error("failed to persist script {}: {source}", .path.display())]
    ScriptPersist {
        /// Intended script location.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A per-image failure log could not be written.
    #[error("failed to write failure log {}: {source}", .path.display())]
    LogPersist {
        /// Intended log location.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The tissue summary or metadata record could not be written.
    #[error("failed to write provenance file {}: {source}", .path.display())]
    ProvenancePersist {
        /// Intended file location.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The metadata record could not be encoded.
    #[error("failed to encode tissue metadata: {0}")]
    MetadataEncode(#[source] serde_json::Error),

    /// A directory could not be listed.
    #[error("failed to read directory {}: {source}", .path.display())]
    ReadDir {
        /// The directory being listed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A calibration table file could not be read.
    #[error("failed to read calibration table {}: {source}", .path.display())]
    CalibrationRead {
        /// The table file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A calibration table file is not valid JSON for a table.
    #[error("failed to parse calibration table {}: {source}", .path.display())]
    CalibrationParse {
        /// The table file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Processing of a specific tissue directory failed.
    #[error("tissue {}: {source}", .tissue_dir.display())]
    Tissue {
        /// The tissue directory being processed.
        tissue_dir: PathBuf,
        /// What went wrong.
        source: Box<PrepareError>,
    },
}

impl PrepareError {
    /// Attach the tissue directory to an error.
    #[must_use]
    pub fn in_tissue(self, tissue_dir: impl Into<PathBuf>) -> Self {
        Self::Tissue {
            tissue_dir: tissue_dir.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error stems from dataset or setup configuration
    /// rather than from a failed write.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Calibration(_)
            | Self::MalformedTissueName(_)
            | Self::MalformedTierName { .. }
            | Self::NoTierFound { .. }
            | Self::InvalidScale(_)
            | Self::TemplateNotFound { .. }
            | Self::Render(_)
            | Self::CalibrationRead { .. }
            | Self::CalibrationParse { .. } => true,
            Self::TemplateRead { .. }
            | Self::ScriptPersist { .. }
            | Self::LogPersist { .. }
            | Self::ProvenancePersist { .. }
            | Self::MetadataEncode(_)
            | Self::ReadDir { .. } => false,
            Self::Tissue { source, .. } => source.is_configuration(),
        }
    }
}
