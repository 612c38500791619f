//! Integration tests for the import flow
//!
//! These tests lay out a dataset with bold references plus a staging
//! directory of auxiliary recordings and verify the tiered matching,
//! overwrite handling, and sidecar companions end to end.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use bidsman::config::RunConfig;
use bidsman::import::{ImportOptions, import_tree};
use bidsman::output::OpSummary;

const EVENTS_BODY: &str = "onset\tduration\ttrial_type\n0.0\t1.0\tfix\n1.0\t2.0\tface\n3.0\t1.0\tfix\n4.0\t2.0\thouse\n6.0\t1.0\tfix\n";

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn bold(dataset: &Path, relative: &str) {
    write(dataset, relative, "volume");
}

fn run_import(source: &Path, dataset: &Path, options: &ImportOptions) -> OpSummary {
    import_tree(source, dataset, options, RunConfig::new(false, false)).unwrap()
}

#[test]
fn events_land_next_to_the_exact_run() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/ses-01/func/sub-01_ses-01_task-rest_run-1_bold.nii.gz");
    bold(dataset.path(), "sub-01/ses-01/func/sub-01_ses-01_task-rest_run-2_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_ses-01_task-rest_run-1_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 1);
    assert!(summary.errors.is_empty());
    assert!(
        dataset
            .path()
            .join("sub-01/ses-01/func/sub-01_ses-01_task-rest_run-1_events.tsv")
            .exists()
    );
}

#[test]
fn zero_padded_runs_match_unpadded_references() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/func/sub-01_task-rest_run-1_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_task-rest_run-01_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 1);
    assert!(
        dataset
            .path()
            .join("sub-01/func/sub-01_task-rest_run-1_events.tsv")
            .exists()
    );
}

#[test]
fn unique_task_reference_accepts_runless_events() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-02/func/sub-02_task-nback_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-02_task-nback_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 1);
    assert!(
        dataset
            .path()
            .join("sub-02/func/sub-02_task-nback_events.tsv")
            .exists()
    );
}

#[test]
fn ambiguous_runs_are_recorded_as_errors() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-03/func/sub-03_task-faces_run-1_bold.nii.gz");
    bold(dataset.path(), "sub-03/func/sub-03_task-faces_run-2_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-03_task-faces_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.errors.len(), 1);
    let reason = &summary.errors[0].1;
    assert!(reason.contains("multiple runs"), "unexpected reason: {reason}");
    assert!(reason.contains('1') && reason.contains('2'));
}

#[test]
fn labeled_events_fall_back_to_unique_runless_reference() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-04/func/sub-04_task-rest_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-04_task-rest_run-2_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 1);
    // The events file takes the reference's run-less base name.
    assert!(
        dataset
            .path()
            .join("sub-04/func/sub-04_task-rest_events.tsv")
            .exists()
    );
}

#[test]
fn missing_reference_and_malformed_names_continue_the_batch() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/func/sub-01_task-rest_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_task-rest_events.tsv", EVENTS_BODY);
    write(staging.path(), "sub-99_task-rest_events.tsv", EVENTS_BODY);
    write(staging.path(), "task-only_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errors.len(), 2);
}

#[test]
fn short_events_files_are_skipped() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/func/sub-01_task-rest_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_task-rest_events.tsv", "onset\tduration\n0.0\t1.0\n");

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].1, "events file too short");
}

#[test]
fn existing_targets_are_skipped_unless_overwrite() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/func/sub-01_task-rest_bold.nii.gz");
    write(
        dataset.path(),
        "sub-01/func/sub-01_task-rest_events.tsv",
        "already here\n",
    );

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_task-rest_events.tsv", EVENTS_BODY);

    let summary = run_import(staging.path(), dataset.path(), &ImportOptions::default());
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].1, "already exists");

    let options = ImportOptions {
        overwrite: true,
        ..Default::default()
    };
    let summary = run_import(staging.path(), dataset.path(), &options);
    assert_eq!(summary.processed, 1);
    let copied = fs::read_to_string(
        dataset.path().join("sub-01/func/sub-01_task-rest_events.tsv"),
    )
    .unwrap();
    assert_eq!(copied, EVENTS_BODY);
}

#[test]
fn physio_brings_its_json_companion() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/func/sub-01_task-rest_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_task-rest_physio.tsv", "cardiac\trespiratory\n1\t2\n");
    write(
        staging.path(),
        "sub-01_task-rest_physio.json",
        r#"{"SamplingFrequency": 100}"#,
    );

    let options = ImportOptions {
        include_events: false,
        include_physio: true,
        ..Default::default()
    };
    let summary = run_import(staging.path(), dataset.path(), &options);
    assert_eq!(summary.processed, 1);
    assert!(
        dataset
            .path()
            .join("sub-01/func/sub-01_task-rest_physio.tsv")
            .exists()
    );
    assert!(
        dataset
            .path()
            .join("sub-01/func/sub-01_task-rest_physio.json")
            .exists()
    );
}

#[test]
fn subject_and_session_filters_narrow_the_import() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/ses-01/func/sub-01_ses-01_task-rest_bold.nii.gz");
    bold(dataset.path(), "sub-02/ses-01/func/sub-02_ses-01_task-rest_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_ses-01_task-rest_events.tsv", EVENTS_BODY);
    write(staging.path(), "sub-02_ses-01_task-rest_events.tsv", EVENTS_BODY);

    let options = ImportOptions {
        subject: Some("sub-01".into()),
        session: Some("1".into()),
        ..Default::default()
    };
    let summary = run_import(staging.path(), dataset.path(), &options);
    assert_eq!(summary.processed, 1);
    assert!(
        dataset
            .path()
            .join("sub-01/ses-01/func/sub-01_ses-01_task-rest_events.tsv")
            .exists()
    );
    assert!(
        !dataset
            .path()
            .join("sub-02/ses-01/func/sub-02_ses-01_task-rest_events.tsv")
            .exists()
    );
}

#[test]
fn dry_run_reports_identical_outcomes_without_copying() {
    let dataset = TempDir::new().unwrap();
    bold(dataset.path(), "sub-01/func/sub-01_task-rest_bold.nii.gz");
    bold(dataset.path(), "sub-03/func/sub-03_task-faces_run-1_bold.nii.gz");
    bold(dataset.path(), "sub-03/func/sub-03_task-faces_run-2_bold.nii.gz");

    let staging = TempDir::new().unwrap();
    write(staging.path(), "sub-01_task-rest_events.tsv", EVENTS_BODY);
    write(staging.path(), "sub-03_task-faces_events.tsv", EVENTS_BODY);

    let options = ImportOptions::default();
    let dry = import_tree(
        staging.path(),
        dataset.path(),
        &options,
        RunConfig::new(false, true),
    )
    .unwrap();
    assert!(
        !dataset
            .path()
            .join("sub-01/func/sub-01_task-rest_events.tsv")
            .exists()
    );

    let live = run_import(staging.path(), dataset.path(), &options);
    assert_eq!(dry.processed, live.processed);
    assert_eq!(dry.skipped, live.skipped);
    assert_eq!(dry.errors, live.errors);
}
