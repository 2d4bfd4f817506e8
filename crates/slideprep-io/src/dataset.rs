//! Dataset-level orchestration.
//!
//! [`DatasetRunner`] walks the tissue directories under a dataset root
//! in sorted order and, for each one not yet carrying the provenance
//! sentinel, runs:
//!
//! 1. tissue-name parsing and calibration lookup,
//! 2. reference tier selection,
//! 3. resolution derivation,
//! 4. script rendering (cached by tissue),
//! 5. batch conversion of the reference tier's images,
//! 6. provenance writing.
//!
//! Progress is reported through a [`RunObserver`] so the CLI can drive
//! progress bars without this crate knowing about terminals.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slideprep_pipeline::{
    ConversionOutcome, DerivedResolution, PlaceholderRenderer, ScaleTier, TemplateRenderer,
    TissueRegistry, derive, parse_tissue_name,
};
use tracing::{error, info, warn};

use crate::cache::{ScriptCache, TemplateSource};
use crate::config::PrepareConfig;
use crate::convert::{BatchConverter, ConversionTool};
use crate::error::PrepareError;
use crate::provenance;
use crate::tiers::{find_reference_tier, list_images, list_tissue_dirs};

/// Callbacks fired while a dataset run progresses.
///
/// Every method has an empty default so observers only implement what
/// they display.
pub trait RunObserver {
    /// The dataset root listed `count` tissue directories.
    fn tissues_found(&mut self, _count: usize) {}

    /// A tissue was skipped because it was already processed.
    fn tissue_skipped(&mut self, _tissue_dir: &Path) {}

    /// Processing of a tissue began.
    fn tissue_started(&mut self, _tissue_dir: &Path, _tissue_name: &str) {}

    /// The tissue's reference tier holds `count` images.
    fn images_found(&mut self, _count: usize) {}

    /// One image conversion finished, successfully or not.
    fn image_converted(&mut self, _outcome: &ConversionOutcome) {}

    /// A tissue was processed and its provenance written.
    fn tissue_finished(&mut self, _report: &ProcessedTissue) {}

    /// A tissue failed with a fatal error.
    fn tissue_failed(&mut self, _tissue_dir: &Path, _error: &PrepareError) {}
}

impl RunObserver for () {}

/// What happened to one processed tissue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTissue {
    /// The tissue directory.
    pub tissue_dir: PathBuf,
    /// Tissue class parsed from the directory name.
    pub tissue_name: String,
    /// The reference tier the images were taken from.
    pub tier: ScaleTier,
    /// Effective resolution of the reference tier.
    pub derived: DerivedResolution,
    /// The conversion script used for every image.
    pub script_path: PathBuf,
    /// Number of images converted successfully.
    pub converted: usize,
    /// Images whose conversion failed, in processing order.
    pub failed_images: Vec<PathBuf>,
}

/// Per-tissue entry of a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TissueReport {
    /// The tissue already carried the provenance sentinel.
    Skipped {
        /// The tissue directory.
        tissue_dir: PathBuf,
    },
    /// The tissue was processed in this run.
    Processed(ProcessedTissue),
}

/// A tissue that failed fatally while the run kept going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TissueFailure {
    /// The tissue directory.
    pub tissue_dir: PathBuf,
    /// Rendered error chain.
    pub message: String,
}

/// Result of a dataset run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Skipped and processed tissues in processing order.
    pub reports: Vec<TissueReport>,
    /// Tissues that failed. Only populated when keep-going is enabled.
    pub failures: Vec<TissueFailure>,
}

impl RunSummary {
    /// Number of tissues processed in this run.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r, TissueReport::Processed(_)))
            .count()
    }

    /// Number of tissues skipped as already processed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.reports.len() - self.processed()
    }

    /// Total failed image conversions across processed tissues.
    #[must_use]
    pub fn failed_images(&self) -> usize {
        self.reports
            .iter()
            .map(|r| match r {
                TissueReport::Processed(p) => p.failed_images.len(),
                TissueReport::Skipped { .. } => 0,
            })
            .sum()
    }

    /// Whether any tissue failed fatally.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Processes every tissue directory under a dataset root.
#[derive(Debug)]
pub struct DatasetRunner<T, R> {
    registry: TissueRegistry,
    cache: ScriptCache<R>,
    converter: BatchConverter<T>,
    keep_going: bool,
}

impl<T: ConversionTool> DatasetRunner<T, PlaceholderRenderer> {
    /// Build a runner from `config` with the default template engine.
    #[must_use]
    pub fn from_config(registry: TissueRegistry, config: &PrepareConfig, tool: T) -> Self {
        Self::new(
            registry,
            ScriptCache::with_source(
                config
                    .templates_dir
                    .clone()
                    .map_or(TemplateSource::Builtin, TemplateSource::Dir),
                &config.scripts_dir,
                config.template_name.as_str(),
                PlaceholderRenderer,
            ),
            BatchConverter::new(tool),
        )
        .keep_going(config.keep_going)
    }
}

impl<T: ConversionTool, R: TemplateRenderer> DatasetRunner<T, R> {
    /// Assemble a runner from its parts. Keep-going is off.
    #[must_use]
    pub const fn new(
        registry: TissueRegistry,
        cache: ScriptCache<R>,
        converter: BatchConverter<T>,
    ) -> Self {
        Self {
            registry,
            cache,
            converter,
            keep_going: false,
        }
    }

    /// Record fatal tissue errors and continue instead of halting.
    #[must_use]
    pub const fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// The script cache in use.
    pub const fn cache(&self) -> &ScriptCache<R> {
        &self.cache
    }

    /// The batch converter in use.
    pub const fn converter(&self) -> &BatchConverter<T> {
        &self.converter
    }

    /// Process every tissue directory under `dataset_root`.
    ///
    /// # Errors
    ///
    /// Returns [`PrepareError::ReadDir`] if the root cannot be listed.
    /// Without keep-going, the first fatal tissue error is returned
    /// wrapped in [`PrepareError::Tissue`]; tissues processed before it
    /// keep their provenance.
    pub fn run(
        &self,
        dataset_root: &Path,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary, PrepareError> {
        let tissue_dirs = list_tissue_dirs(dataset_root)?;
        info!(root = %dataset_root.display(), tissues = tissue_dirs.len(), "starting dataset run");
        observer.tissues_found(tissue_dirs.len());

        let mut summary = RunSummary::default();
        for tissue_dir in tissue_dirs {
            if provenance::is_processed(&tissue_dir) {
                info!(tissue_dir = %tissue_dir.display(), "already processed, skipping");
                observer.tissue_skipped(&tissue_dir);
                summary.reports.push(TissueReport::Skipped { tissue_dir });
                continue;
            }

            match self.process_tissue(&tissue_dir, observer) {
                Ok(processed) => {
                    observer.tissue_finished(&processed);
                    summary.reports.push(TissueReport::Processed(processed));
                }
                Err(e) => {
                    let e = e.in_tissue(&tissue_dir);
                    observer.tissue_failed(&tissue_dir, &e);
                    if !self.keep_going {
                        return Err(e);
                    }
                    error!(error = %e, "tissue failed, continuing");
                    summary.failures.push(TissueFailure {
                        tissue_dir,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = summary.processed(),
            skipped = summary.skipped(),
            failed_tissues = summary.failures.len(),
            failed_images = summary.failed_images(),
            "dataset run finished",
        );
        Ok(summary)
    }

    /// Process a single tissue directory regardless of its sentinel.
    ///
    /// # Errors
    ///
    /// Any fatal error for the tissue, unwrapped.
    pub fn process_tissue(
        &self,
        tissue_dir: &Path,
        observer: &mut dyn RunObserver,
    ) -> Result<ProcessedTissue, PrepareError> {
        let dir_name = tissue_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tissue_name = parse_tissue_name(&dir_name)?;
        observer.tissue_started(tissue_dir, tissue_name);

        let calibration = self.registry.lookup(tissue_name)?;
        let tier = find_reference_tier(tissue_dir)?;
        let derived = derive(calibration, &tier)?;
        if tier.scale_percent > 100.0 {
            warn!(
                tissue = tissue_name,
                tier = %tier.directory_path.display(),
                scale = tier.scale_percent,
                "reference tier is above full scale, converting anyway",
            );
        }
        info!(
            tissue = tissue_name,
            tier = %tier.directory_path.display(),
            mag = derived.effective_magnification,
            mpp = derived.effective_pixel_width_um,
            "derived reference resolution",
        );

        let script_path = self.cache.get_or_render(
            tissue_name,
            derived.effective_pixel_width_um,
            Some(derived.effective_pixel_height_um),
        )?;

        let images = list_images(&tier.directory_path)?;
        observer.images_found(images.len());
        let outcomes = self
            .converter
            .run(&script_path, &images, tissue_dir, |outcome| {
                observer.image_converted(outcome);
            })?;

        provenance::write(tissue_dir, tissue_name, calibration, &tier, &derived)?;

        let failed_images: Vec<PathBuf> = outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| o.image_path.clone())
            .collect();
        Ok(ProcessedTissue {
            tissue_dir: tissue_dir.to_path_buf(),
            tissue_name: tissue_name.to_owned(),
            tier,
            derived,
            script_path,
            converted: outcomes.len() - failed_images.len(),
            failed_images,
        })
    }
}
