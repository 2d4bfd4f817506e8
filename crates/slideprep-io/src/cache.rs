//! Rendered conversion-script cache.
//!
//! Scripts are cached **by tissue name only**: the cached file name is
//! derived from the tissue and the template name, never from the pixel
//! size. A script already on disk is returned as-is, even if it was
//! rendered for a different pixel size (e.g. after a calibration table
//! change); delete the stale script to force a re-render.
//!
//! Scripts are persisted atomically, so an interrupted render never
//! leaves a truncated script behind to be reused.
//!
//! Template sources come either from a templates directory or from the
//! export template compiled into the binary.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use slideprep_pipeline::template::rendered_script_name;
use slideprep_pipeline::{TemplateParams, TemplateRenderer};
use tracing::{debug, info};

use crate::atomic;
use crate::config::PrepareConfig;
use crate::error::PrepareError;

/// The shipped OME-TIFF export template, available without a templates
/// directory under [`PrepareConfig::DEFAULT_TEMPLATE_NAME`].
pub const BUILTIN_TEMPLATE: &str =
    include_str!("../../../templates/export_image_as_tiff.groovy.jinja2");

/// Where template sources are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Templates compiled into the binary.
    Builtin,
    /// Template files in a directory.
    Dir(PathBuf),
}

impl TemplateSource {
    /// Load the template named `template_name`.
    ///
    /// # Errors
    ///
    /// - [`PrepareError::TemplateNotFound`] if no such template exists.
    /// - [`PrepareError::TemplateRead`] if a template file cannot be read.
    pub fn load(&self, template_name: &str) -> Result<Cow<'static, str>, PrepareError> {
        match self {
            Self::Builtin if template_name == PrepareConfig::DEFAULT_TEMPLATE_NAME => {
                Ok(Cow::Borrowed(BUILTIN_TEMPLATE))
            }
            Self::Builtin => Err(PrepareError::TemplateNotFound {
                path: PathBuf::from(template_name),
            }),
            Self::Dir(dir) => {
                let path = dir.join(template_name);
                fs::read_to_string(&path)
                    .map(Cow::Owned)
                    .map_err(|source| {
                        if source.kind() == io::ErrorKind::NotFound {
                            PrepareError::TemplateNotFound { path }
                        } else {
                            PrepareError::TemplateRead { path, source }
                        }
                    })
            }
        }
    }
}

/// Renders conversion scripts from a template on first use and reuses
/// them afterwards, including across runs.
#[derive(Debug, Clone)]
pub struct ScriptCache<R> {
    templates: TemplateSource,
    scripts_dir: PathBuf,
    template_name: String,
    renderer: R,
}

impl<R: TemplateRenderer> ScriptCache<R> {
    /// Create a cache reading `template_name` from `templates_dir` and
    /// persisting rendered scripts to `scripts_dir`.
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
        template_name: impl Into<String>,
        renderer: R,
    ) -> Self {
        Self::with_source(
            TemplateSource::Dir(templates_dir.into()),
            scripts_dir,
            template_name,
            renderer,
        )
    }

    /// Create a cache reading `template_name` from `templates`.
    pub fn with_source(
        templates: TemplateSource,
        scripts_dir: impl Into<PathBuf>,
        template_name: impl Into<String>,
        renderer: R,
    ) -> Self {
        Self {
            templates,
            scripts_dir: scripts_dir.into(),
            template_name: template_name.into(),
            renderer,
        }
    }

    /// The template engine in use.
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Where the script for `tissue_name` lives (or will live).
    #[must_use]
    pub fn script_path(&self, tissue_name: &str) -> PathBuf {
        self.scripts_dir
            .join(rendered_script_name(tissue_name, &self.template_name))
    }

    /// Return the absolute path of the script for `tissue_name`,
    /// rendering and persisting it first if it does not exist yet.
    ///
    /// `mpp_y` defaults to `mpp_x` when `None`. On a cache hit the
    /// pixel sizes are ignored.
    ///
    /// # Errors
    ///
    /// - [`PrepareError::TemplateNotFound`] if the template source is missing.
    /// - [`PrepareError::TemplateRead`] if it exists but cannot be read.
    /// - [`PrepareError::Render`] if rendering fails.
    /// - [`PrepareError::ScriptPersist`] if the script cannot be written.
    pub fn get_or_render(
        &self,
        tissue_name: &str,
        mpp_x: f64,
        mpp_y: Option<f64>,
    ) -> Result<PathBuf, PrepareError> {
        let script_path = self.script_path(tissue_name);
        if script_path.is_file() {
            debug!(tissue = tissue_name, script = %script_path.display(), "reusing cached script");
            return absolute(&script_path);
        }

        let template = self.templates.load(&self.template_name)?;

        let rendered = self
            .renderer
            .render(&template, &TemplateParams::pixel_size(mpp_x, mpp_y))?;

        let persist_error = |source| PrepareError::ScriptPersist {
            path: script_path.clone(),
            source,
        };
        fs::create_dir_all(&self.scripts_dir).map_err(persist_error)?;
        atomic::write(&script_path, rendered).map_err(persist_error)?;
        info!(tissue = tissue_name, script = %script_path.display(), mpp_x, "rendered conversion script");

        absolute(&script_path)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PrepareError> {
    std::path::absolute(path).map_err(|source| PrepareError::ScriptPersist {
        path: path.to_path_buf(),
        source,
    })
}
