//! slideprep-io: filesystem and process I/O for dataset preparation.
//!
//! Scans tissue and tier directories, caches rendered conversion
//! scripts, drives the external conversion tool image by image, and
//! writes per-tissue provenance. The pure computations live in
//! `slideprep-pipeline`; everything that touches the disk or spawns a
//! process lives here.

mod atomic;
pub mod cache;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod provenance;
pub mod tiers;

pub use cache::{BUILTIN_TEMPLATE, ScriptCache, TemplateSource};
pub use config::{PrepareConfig, default_scripts_dir, load_calibration_table};
pub use convert::{BatchConverter, ConversionTool, ExternalTool};
pub use dataset::{
    DatasetRunner, ProcessedTissue, RunObserver, RunSummary, TissueFailure, TissueReport,
};
pub use error::PrepareError;
pub use tiers::{find_reference_tier, list_images, list_tissue_dirs};
