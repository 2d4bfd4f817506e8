//! slideprep: prepare a multi-resolution whole-slide image dataset for
//! viewer import.
//!
//! For every tissue directory under the dataset root that has not been
//! processed yet, picks the full-resolution tier, works out its true
//! magnification and pixel size, renders a QuPath conversion script for
//! the tissue class, converts every image of the tier with it, and
//! writes a summary plus a metadata record next to the images.
//!
//! # Usage
//!
//! ```text
//! slideprep [OPTIONS] [DATASET_ROOT]
//! ```
//!
//! Logs go to stderr and honor `RUST_LOG`; `--json` prints the run
//! summary on stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use slideprep_io::{
    DatasetRunner, ExternalTool, PrepareConfig, PrepareError, ProcessedTissue, RunObserver,
    default_scripts_dir, load_calibration_table,
};
use slideprep_pipeline::{CalibrationTable, ConversionOutcome, TissueRegistry};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Prepare a whole-slide image dataset for viewer import.
///
/// Converts the full-resolution tier of every unprocessed tissue
/// directory with an external tool (QuPath by default) and records the
/// derived magnification and pixel size beside the images.
#[derive(Parser)]
#[command(name = "slideprep", version)]
struct Cli {
    /// Root directory holding one subdirectory per tissue sample.
    #[arg(default_value = PrepareConfig::DEFAULT_DATASET_ROOT)]
    dataset_root: PathBuf,

    /// Conversion program, invoked as `<tool> [tool args] script <script> -i <image>`.
    #[arg(long, default_value = ExternalTool::DEFAULT_PROGRAM)]
    tool: OsString,

    /// Extra argument placed before `script` (repeatable).
    #[arg(long = "tool-arg", value_name = "ARG", allow_hyphen_values = true)]
    tool_args: Vec<OsString>,

    /// Directory holding conversion script templates [default: the
    /// templates built into slideprep].
    #[arg(long, value_name = "DIR")]
    templates_dir: Option<PathBuf>,

    /// Directory rendered scripts are cached in [default: `slideprep/scripts`
    /// under the user cache directory].
    #[arg(long, value_name = "DIR")]
    scripts_dir: Option<PathBuf>,

    /// Template file name inside the templates directory.
    #[arg(long, default_value = PrepareConfig::DEFAULT_TEMPLATE_NAME)]
    template: String,

    /// JSON calibration table to use instead of the built-in ANHIR one.
    #[arg(long, value_name = "FILE")]
    calibrations: Option<PathBuf>,

    /// Record failed tissues and continue with the rest.
    #[arg(long)]
    keep_going: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bars.
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn config(&self) -> PrepareConfig {
        PrepareConfig {
            templates_dir: self.templates_dir.clone(),
            scripts_dir: self
                .scripts_dir
                .clone()
                .unwrap_or_else(default_scripts_dir),
            template_name: self.template.clone(),
            keep_going: self.keep_going,
        }
    }

    fn tool(&self) -> ExternalTool {
        ExternalTool::new(&self.tool).with_leading_args(&self.tool_args)
    }
}

fn load_registry(calibrations: Option<&Path>) -> Result<TissueRegistry, PrepareError> {
    let table = match calibrations {
        Some(path) => load_calibration_table(path)?,
        None => CalibrationTable::default(),
    };
    Ok(TissueRegistry::new(table)?)
}

/// Writes log lines to stderr with progress bars suspended, so the two
/// never interleave on one line.
#[derive(Clone)]
struct SuspendingStderr(MultiProgress);

impl Write for SuspendingStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

fn init_tracing(multi: &MultiProgress) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let multi = multi.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || SuspendingStderr(multi.clone()))
        .init();
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn as_len(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Drives one bar for tissues and one per-tissue bar for images.
struct ProgressObserver {
    multi: MultiProgress,
    tissues: ProgressBar,
    images: Option<ProgressBar>,
}

impl ProgressObserver {
    fn new(multi: MultiProgress) -> Self {
        let tissues = multi.add(ProgressBar::new(0).with_style(bar_style(
            "[{elapsed_precise}] tissues [{bar:30.cyan/blue}] {pos}/{len} {msg}",
        )));
        Self {
            multi,
            tissues,
            images: None,
        }
    }

    fn close_images(&mut self) {
        if let Some(bar) = self.images.take() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn finish(mut self) {
        self.close_images();
        self.tissues.finish_and_clear();
    }
}

impl RunObserver for ProgressObserver {
    fn tissues_found(&mut self, count: usize) {
        self.tissues.set_length(as_len(count));
    }

    fn tissue_skipped(&mut self, tissue_dir: &Path) {
        self.tissues.set_message(format!("skipped {}", display_name(tissue_dir)));
        self.tissues.inc(1);
    }

    fn tissue_started(&mut self, tissue_dir: &Path, _tissue_name: &str) {
        self.tissues.set_message(display_name(tissue_dir));
    }

    fn images_found(&mut self, count: usize) {
        self.close_images();
        let bar = self.multi.add(ProgressBar::new(as_len(count)).with_style(bar_style(
            "  images [{bar:30.green/white}] {pos}/{len} ({eta}) {msg}",
        )));
        self.images = Some(bar);
    }

    fn image_converted(&mut self, outcome: &ConversionOutcome) {
        if let Some(bar) = &self.images {
            if !outcome.succeeded {
                bar.set_message(format!("failed: {}", display_name(&outcome.image_path)));
            }
            bar.inc(1);
        }
    }

    fn tissue_finished(&mut self, _report: &ProcessedTissue) {
        self.close_images();
        self.tissues.inc(1);
    }

    fn tissue_failed(&mut self, _tissue_dir: &Path, _error: &PrepareError) {
        self.close_images();
        self.tissues.inc(1);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let multi = if cli.no_progress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    init_tracing(&multi);

    let registry = match load_registry(cli.calibrations.as_deref()) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "invalid calibration table");
            return ExitCode::FAILURE;
        }
    };
    info!(tissues = registry.len(), "calibrations loaded");

    let runner = DatasetRunner::from_config(registry, &cli.config(), cli.tool());
    let mut progress = ProgressObserver::new(multi);
    let result = runner.run(&cli.dataset_root, &mut progress);
    progress.finish();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            if e.is_configuration() {
                error!(error = %e, "configuration error, run halted");
            } else {
                error!(error = %e, "run halted");
            }
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "failed to encode run summary");
                return ExitCode::FAILURE;
            }
        }
    }

    if summary.failed_images() > 0 {
        warn!(
            failed_images = summary.failed_images(),
            "some images failed to convert; see *_process.log files",
        );
    }
    if summary.has_failures() {
        for failure in &summary.failures {
            error!(tissue_dir = %failure.tissue_dir.display(), error = %failure.message, "tissue failed");
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
