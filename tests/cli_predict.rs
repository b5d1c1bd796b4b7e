use std::fs;
use std::path::Path;
use std::process::Command;

use liquidcgp::encode::NUM_FEATURES;
use liquidcgp::ensemble::{EnsembleSpec, NUM_FOLDS};
use liquidcgp::model::LogisticModel;
use ndarray::Array1;
use tempfile::tempdir;

const WORKED_EXAMPLE_FLAGS: [&str; 16] = [
    "--sex",
    "man",
    "--age",
    "60",
    "--ps",
    "1",
    "--diagnosis-date",
    "2024-01-01",
    "--specimen-date",
    "2024-02-01",
    "--treatment-line",
    "2",
    "--response",
    "PR",
    "--metastasis",
    "liver,lung",
];

fn write_members(dir: &Path, count: usize) {
    let spec = EnsembleSpec::new(dir);
    for index in 0..count {
        let mut coefficients = Array1::zeros(NUM_FEATURES);
        coefficients[3] = 0.3;
        LogisticModel::new(-1.0 + 0.2 * index as f64, coefficients)
            .expect("valid member")
            .save(&spec.member_path(index))
            .expect("write member");
    }
}

#[test]
fn predict_prints_result_and_writes_chart() {
    let tmp = tempdir().expect("temporary directory");
    write_members(tmp.path(), NUM_FOLDS);
    let chart_path = tmp.path().join("result.svg");

    let exe = env!("CARGO_BIN_EXE_liquidcgp");
    let output = Command::new(exe)
        .current_dir(tmp.path())
        .arg("predict")
        .args(WORKED_EXAMPLE_FLAGS)
        .args([
            "--models",
            tmp.path().to_str().expect("path str"),
            "--chart",
            chart_path.to_str().expect("path str"),
            "--verbose",
        ])
        .output()
        .expect("run liquidcgp cli");

    assert!(output.status.success(), "CLI exited with {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let result_line = stdout
        .lines()
        .find(|line| line.starts_with("Result: "))
        .expect("result line");
    let percent: f64 = result_line
        .trim_start_matches("Result: ")
        .trim_end_matches('%')
        .parse()
        .expect("numeric percentage");
    assert!((0.01..=99.99).contains(&percent));
    assert!(stdout.contains("member 4: "));
    assert!(stdout.contains("cannot be used for clinical diagnosis"));

    let svg = fs::read_to_string(&chart_path).expect("chart written");
    assert_eq!(svg.matches("<path").count(), 2);
}

#[test]
fn predict_reads_record_file_and_models_from_environment() {
    let tmp = tempdir().expect("temporary directory");
    write_members(tmp.path(), NUM_FOLDS);
    let record_path = tmp.path().join("patient.toml");
    fs::write(
        &record_path,
        "sex = \"woman\"\n\
age = 72\n\
performance_status = 2\n\
diagnosis_date = \"2023-05-01\"\n\
specimen_date = \"2023-04-20\"\n\
treatment_line = 1\n\
response = \"SD\"\n\
metastases = [\"peritoneum\"]\n",
    )
    .expect("write record");

    let output = Command::new(env!("CARGO_BIN_EXE_liquidcgp"))
        .env("LIQUIDCGP_MODELS", tmp.path())
        .args(["predict", "--record", record_path.to_str().expect("path str")])
        .output()
        .expect("run liquidcgp cli");

    assert!(output.status.success(), "CLI exited with {:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Result: "));
}

#[test]
fn missing_artifacts_fail_the_request() {
    let tmp = tempdir().expect("temporary directory");
    let output = Command::new(env!("CARGO_BIN_EXE_liquidcgp"))
        .arg("predict")
        .args(WORKED_EXAMPLE_FLAGS)
        .args(["--models", tmp.path().to_str().expect("path str")])
        .output()
        .expect("run liquidcgp cli");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load ensemble member 0"), "{stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Result: "));
}

#[test]
fn partial_member_set_is_refused() {
    let tmp = tempdir().expect("temporary directory");
    write_members(tmp.path(), 1);
    let models = tmp.path().to_str().expect("path str");

    let output = Command::new(env!("CARGO_BIN_EXE_liquidcgp"))
        .arg("predict")
        .args(WORKED_EXAMPLE_FLAGS)
        .args(["--models", models])
        .output()
        .expect("run liquidcgp cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load ensemble member 1"), "{stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Result: "));

    let shrunk = Command::new(env!("CARGO_BIN_EXE_liquidcgp"))
        .arg("predict")
        .args(WORKED_EXAMPLE_FLAGS)
        .args(["--models", models, "--folds", "1"])
        .output()
        .expect("run liquidcgp cli");
    assert!(!shrunk.status.success());
    assert!(!String::from_utf8_lossy(&shrunk.stdout).contains("Result: "));
}

#[test]
fn encode_prints_named_feature_vector() {
    let output = Command::new(env!("CARGO_BIN_EXE_liquidcgp"))
        .arg("encode")
        .args(WORKED_EXAMPLE_FLAGS)
        .output()
        .expect("run liquidcgp cli");

    assert!(output.status.success(), "CLI exited with {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), NUM_FEATURES);
    assert_eq!(lines[2], "days_diagnosis_to_specimen\t31");
    assert_eq!(lines[7], "meta_liver\t1");
    assert_eq!(lines[25], "response_pr\t1");
}
