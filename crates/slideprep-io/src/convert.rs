//! Batch conversion through an external tool.
//!
//! This module defines the [`ConversionTool`] trait for running one
//! conversion and [`BatchConverter`], which runs a tool over a list of
//! images strictly one at a time. A failed conversion never aborts the
//! batch: it is recorded as an unsuccessful [`ConversionOutcome`] and a
//! failure log is written next to the tissue's other outputs.
//!
//! Invocations block with no timeout; a hung tool stalls the batch.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use slideprep_pipeline::ConversionOutcome;
use slideprep_pipeline::provenance::{failure_log_name, render_failure_log};
use tracing::{debug, warn};

use crate::error::PrepareError;

/// Trait for conversion tools.
///
/// Input: a rendered script and one image.
/// Output: the outcome of running the script on that image.
pub trait ConversionTool {
    /// Convert `image_path` with `script_path`, blocking until done.
    ///
    /// Implementations must not return early on failure; every problem,
    /// including failure to start, is reported through the outcome.
    fn convert(&self, script_path: &Path, image_path: &Path) -> ConversionOutcome;
}

/// Runs an external program as
/// `<program> [leading args...] script <script_path> -i <image_path>`.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl ExternalTool {
    /// Program name of the QuPath command-line launcher.
    pub const DEFAULT_PROGRAM: &'static str = "QuPath";

    /// Use `program`, resolved through `PATH` if not a path.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments inserted before `script`, e.g. for wrapper launchers.
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self, script_path: &Path, image_path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg("script")
            .arg(script_path)
            .arg("-i")
            .arg(image_path)
            .stdin(Stdio::null());
        command
    }
}

impl Default for ExternalTool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

impl ConversionTool for ExternalTool {
    fn convert(&self, script_path: &Path, image_path: &Path) -> ConversionOutcome {
        match self.command(script_path, image_path).output() {
            Ok(output) => ConversionOutcome::from_exit(
                image_path.to_path_buf(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ),
            Err(e) => ConversionOutcome::from_exit(
                image_path.to_path_buf(),
                None,
                format!("failed to start {}: {e}", self.program.to_string_lossy()),
            ),
        }
    }
}

/// Runs a [`ConversionTool`] over a sequence of images, isolating
/// per-image failures.
#[derive(Debug, Clone, Default)]
pub struct BatchConverter<T> {
    tool: T,
}

impl<T: ConversionTool> BatchConverter<T> {
    /// Create a converter around `tool`.
    pub const fn new(tool: T) -> Self {
        Self { tool }
    }

    /// The wrapped tool.
    pub const fn tool(&self) -> &T {
        &self.tool
    }

    /// Convert every image in order with `script_path`.
    ///
    /// For each failed conversion, a log named after the image (see
    /// [`failure_log_name`]) is written to `log_dir`. `on_outcome` is
    /// called after each image, failed or not, for progress reporting.
    ///
    /// # Errors
    ///
    /// Returns [`PrepareError::LogPersist`] if a failure log cannot be
    /// written. Conversion failures themselves are never errors.
    pub fn run<F>(
        &self,
        script_path: &Path,
        image_paths: &[PathBuf],
        log_dir: &Path,
        mut on_outcome: F,
    ) -> Result<Vec<ConversionOutcome>, PrepareError>
    where
        F: FnMut(&ConversionOutcome),
    {
        let mut outcomes = Vec::with_capacity(image_paths.len());
        for image_path in image_paths {
            let outcome = self.tool.convert(script_path, image_path);
            if outcome.succeeded {
                debug!(image = %image_path.display(), "converted");
            } else {
                let log_path = log_dir.join(failure_log_name(image_path));
                warn!(
                    image = %image_path.display(),
                    exit_code = ?outcome.exit_code,
                    log = %log_path.display(),
                    "conversion failed",
                );
                fs::write(&log_path, render_failure_log(&outcome))
                    .map_err(|source| PrepareError::LogPersist {
                        path: log_path,
                        source,
                    })?;
            }
            on_outcome(&outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Fails (exit 1) for images whose file name contains `fail`.
    #[derive(Default)]
    struct ScriptedTool {
        calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl ConversionTool for ScriptedTool {
        fn convert(&self, script_path: &Path, image_path: &Path) -> ConversionOutcome {
            self.calls
                .borrow_mut()
                .push((script_path.to_path_buf(), image_path.to_path_buf()));
            let fail = image_path.to_string_lossy().contains("fail");
            ConversionOutcome::from_exit(
                image_path.to_path_buf(),
                Some(i32::from(fail)),
                if fail { "simulated failure\n".to_owned() } else { String::new() },
            )
        }
    }

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with("_process.log"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn one_failure_among_three() {
        let tmp = tempfile::tempdir().unwrap();
        let images: Vec<PathBuf> = ["S1.jpg", "S2_fail.jpg", "S3.jpg"]
            .iter()
            .map(|n| tmp.path().join("scale-100pc").join(n))
            .collect();
        let converter = BatchConverter::new(ScriptedTool::default());

        let mut seen = 0;
        let outcomes = converter
            .run(Path::new("/scripts/k.groovy"), &images, tmp.path(), |_| seen += 1)
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.succeeded).count(), 2);
        assert_eq!(seen, 3);
        assert_eq!(log_files(tmp.path()), vec!["S2_fail_process.log"]);

        let log = fs::read_to_string(tmp.path().join("S2_fail_process.log")).unwrap();
        assert_eq!(log, "Command failed!\nReturn code: 1\n\nsimulated failure\n");
    }

    #[test]
    fn images_run_in_order_with_same_script() {
        let tmp = tempfile::tempdir().unwrap();
        let images = vec![PathBuf::from("b.jpg"), PathBuf::from("a.jpg")];
        let converter = BatchConverter::new(ScriptedTool::default());
        converter
            .run(Path::new("s.groovy"), &images, tmp.path(), |_| {})
            .unwrap();

        let calls = converter.tool().calls.borrow();
        assert_eq!(
            *calls,
            vec![
                (PathBuf::from("s.groovy"), PathBuf::from("b.jpg")),
                (PathBuf::from("s.groovy"), PathBuf::from("a.jpg")),
            ]
        );
    }

    #[test]
    fn all_success_writes_no_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let images = vec![PathBuf::from("S1.jpg"), PathBuf::from("S2.jpg")];
        let outcomes = BatchConverter::new(ScriptedTool::default())
            .run(Path::new("s.groovy"), &images, tmp.path(), |_| {})
            .unwrap();
        assert!(outcomes.iter().all(|o| o.succeeded));
        assert!(log_files(tmp.path()).is_empty());
    }

    #[test]
    fn unwritable_log_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let images = vec![PathBuf::from("fail.jpg")];
        let err = BatchConverter::new(ScriptedTool::default())
            .run(Path::new("s.groovy"), &images, &tmp.path().join("absent"), |_| {})
            .unwrap_err();
        assert!(matches!(err, PrepareError::LogPersist { .. }));
    }

    #[test]
    fn missing_program_is_a_failed_outcome() {
        let tool = ExternalTool::new("slideprep-test-no-such-program");
        let outcome = tool.convert(Path::new("s.groovy"), Path::new("S1.jpg"));
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.stderr_text.contains("failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn external_tool_passes_script_and_image() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("fake-qupath.sh");
        fs::write(
            &fake,
            "[ \"$1\" = script ] && [ \"$3\" = -i ] || exit 64\n\
             case \"$4\" in *bad*) echo \"cannot open $4\" >&2; exit 3;; esac\n\
             exit 0\n",
        )
        .unwrap();
        let tool = ExternalTool::new("sh").with_leading_args([&fake]);

        let ok = tool.convert(Path::new("/s/k.groovy"), Path::new("/t/good.jpg"));
        assert!(ok.succeeded, "{ok:?}");
        assert_eq!(ok.exit_code, Some(0));

        let bad = tool.convert(Path::new("/s/k.groovy"), Path::new("/t/bad.jpg"));
        assert!(!bad.succeeded);
        assert_eq!(bad.exit_code, Some(3));
        assert_eq!(bad.stderr_text, "cannot open /t/bad.jpg\n");
    }
}
