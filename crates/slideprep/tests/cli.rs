//! Runs the built binary against a temporary dataset with a shell
//! script standing in for QuPath.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("templates")
}

fn touch_images(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"jpeg").unwrap();
    }
}

fn fake_tool(dir: &Path) -> PathBuf {
    let path = dir.join("fake-qupath.sh");
    fs::write(
        &path,
        "[ \"$1\" = script ] && [ \"$3\" = -i ] || exit 64\n\
         case \"$4\" in *broken*) echo \"cannot read $4\" >&2; exit 1;; esac\n",
    )
    .unwrap();
    path
}

/// The binary with the stand-in tool, JSON output and no progress bars.
fn slideprep(work: &Path) -> Command {
    let fake = fake_tool(work);
    let mut command = Command::new(env!("CARGO_BIN_EXE_slideprep"));
    command
        .arg("--tool")
        .arg("sh")
        .arg("--tool-arg")
        .arg(fake)
        .args(["--json", "--no-progress"])
        .env("RUST_LOG", "warn");
    command
}

fn run_cli(work: &Path, extra: &[&str]) -> Output {
    slideprep(work)
        .arg("--templates-dir")
        .arg(templates_dir())
        .arg("--scripts-dir")
        .arg(work.join("scripts"))
        .args(extra)
        .arg(work.join("images"))
        .output()
        .unwrap()
}

fn summary(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be the JSON run summary")
}

#[test]
fn prepares_dataset_and_prints_summary() {
    let dir = tempdir().unwrap();
    let kidney = dir.path().join("images").join("kidney_1");
    touch_images(&kidney.join("scale-25pc"), &["S1.jpg"]);
    touch_images(&kidney.join("scale-100pc"), &["S1.jpg", "broken.jpg"]);

    let output = run_cli(dir.path(), &[]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let first = summary(&output);
    let report = &first["reports"][0];
    assert_eq!(report["status"], "processed");
    assert_eq!(report["tissue_name"], "kidney");
    assert_eq!(report["tier"]["scale_percent"], 100.0);
    assert_eq!(report["derived"]["effective_magnification"], 40.0);
    assert_eq!(report["converted"], 1);
    assert_eq!(report["failed_images"].as_array().unwrap().len(), 1);

    assert!(kidney.join("README.md").is_file());
    assert!(kidney.join("broken_process.log").is_file());
    assert!(
        dir.path()
            .join("scripts")
            .join("kidney_export_image_as_tiff.groovy")
            .is_file()
    );

    // Second run: everything is skipped.
    let again = run_cli(dir.path(), &[]);
    assert!(again.status.success());
    assert_eq!(summary(&again)["reports"][0]["status"], "skipped");
}

#[test]
fn unknown_tissue_fails_the_run() {
    let dir = tempdir().unwrap();
    touch_images(&dir.path().join("images").join("brain_1").join("scale-100pc"), &["S1.jpg"]);

    let output = run_cli(dir.path(), &[]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("brain"));
}

#[test]
fn keep_going_reports_failures_and_exits_nonzero() {
    let dir = tempdir().unwrap();
    let images = dir.path().join("images");
    touch_images(&images.join("brain_1").join("scale-100pc"), &["S1.jpg"]);
    touch_images(&images.join("kidney_1").join("scale-100pc"), &["S1.jpg"]);

    let output = run_cli(dir.path(), &["--keep-going"]);
    assert!(!output.status.success());

    let summary = summary(&output);
    assert_eq!(summary["failures"].as_array().unwrap().len(), 1);
    assert_eq!(summary["reports"][0]["tissue_name"], "kidney");
    assert!(images.join("kidney_1").join("README.md").is_file());
}

#[test]
fn custom_calibration_table() {
    let dir = tempdir().unwrap();
    touch_images(&dir.path().join("images").join("brain_1").join("scale-50pc"), &["S1.jpg"]);
    let table = dir.path().join("calibrations.json");
    fs::write(
        &table,
        r#"[{"tissue_name": "brain", "base_magnification": 20.0,
            "base_pixel_width_um": 0.5, "base_pixel_height_um": 0.5}]"#,
    )
    .unwrap();

    let output = run_cli(dir.path(), &["--calibrations", table.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let derived = &summary(&output)["reports"][0]["derived"];
    assert_eq!(derived["effective_magnification"], 10.0);
    assert_eq!(derived["effective_pixel_width_um"], 1.0);
}

#[test]
fn default_locations_do_not_depend_on_working_directory() {
    let dir = tempdir().unwrap();
    touch_images(&dir.path().join("images").join("kidney_1").join("scale-100pc"), &["S1.jpg"]);
    let elsewhere = dir.path().join("elsewhere");
    fs::create_dir(&elsewhere).unwrap();
    let home = dir.path().join("home");

    let output = slideprep(dir.path())
        .arg(dir.path().join("images"))
        .current_dir(&elsewhere)
        .env("HOME", &home)
        .env("XDG_CACHE_HOME", home.join(".cache"))
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Nothing is read from or written to the working directory.
    assert_eq!(fs::read_dir(&elsewhere).unwrap().count(), 0);

    let cache = if cfg!(target_os = "macos") {
        home.join("Library").join("Caches")
    } else {
        home.join(".cache")
    };
    let script = cache
        .join("slideprep")
        .join("scripts")
        .join("kidney_export_image_as_tiff.groovy");
    let rendered = fs::read_to_string(&script).unwrap();
    assert!(rendered.contains("OMEPyramidWriter"));
    assert!(rendered.contains(".pixelSizeMicrons(0.2528, 0.2528)"));
    assert_eq!(summary(&output)["reports"][0]["status"], "processed");
}
