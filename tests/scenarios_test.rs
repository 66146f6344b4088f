//! End-to-end runs over real directories with the built-in validators

use file_validator_rs::prelude::*;
use indicatif::ProgressBar;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WELL_FORMED_HTML: &[u8] =
    b"<!DOCTYPE html><html><head><title>t</title></head><body><p>ok</p></body></html>";

fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtin(&mut registry).unwrap();
    registry
}

/// Run configuration with an empty config directory, so Videos is unusable
fn run_config(root: &Path, out: &TempDir) -> RunConfig {
    let config_dir = out.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    RunConfig {
        roots: vec![root.to_path_buf()],
        report_dir: out.path().join("reports"),
        stylesheet: "report.xsl".into(),
        resume: None,
        scan: ScanOptions {
            relative: true,
            config_dir,
            ..ScanOptions::default()
        },
    }
}

fn run(config: &RunConfig) -> RunReport {
    validate_paths(&builtin_registry(), config, Interrupt::new(), ProgressBar::hidden()).unwrap()
}

fn sorted_records(path: &Path) -> Vec<ReportRecord> {
    let mut records = read_records(path).unwrap();
    records.sort_by(|a, b| a.path.cmp(&b.path));
    records
}

fn record(path: &str, code: i32, message: &str) -> ReportRecord {
    ReportRecord {
        path: path.into(),
        result: ValidationResult::invalid(code, message),
    }
}

#[test]
fn test_scenario_a_html_files() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(data.path().join("a.htm"), WELL_FORMED_HTML).unwrap();
    File::create(data.path().join("b.html")).unwrap();

    let outcome = run(&run_config(data.path(), &out));

    assert_eq!(
        sorted_records(&outcome.report_path),
        [
            record("a.htm", 0, ""),
            record("b.html", 1, "ParserError: Document is empty"),
        ]
    );
    assert_eq!(outcome.summary.validated, 2);
    assert_eq!(outcome.summary.invalid, 1);
}

#[test]
fn test_scenario_b_unknown_extension() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    File::create(data.path().join("c.unknownext")).unwrap();
    File::create(data.path().join("f.unknownext")).unwrap();

    let outcome = run(&run_config(data.path(), &out));

    assert!(read_records(&outcome.report_path).unwrap().is_empty());
    // First file discovers there is no validator, the second is skipped outright
    assert_eq!(outcome.summary.no_validator, 1);
    assert_eq!(outcome.summary.ignored, 1);
}

#[test]
fn test_scenario_c_resumed_file_is_not_revalidated() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    // Garbage content: re-validating would produce a failure record
    fs::write(data.path().join("d.wav"), b"not a wave file").unwrap();

    let previous = out.path().join("previous.xml");
    let mut report = ReportWriter::create_at(&previous, "report.xsl").unwrap();
    report.write("d.wav", &ValidationResult::valid()).unwrap();
    report.finish().unwrap();

    let mut config = run_config(data.path(), &out);
    config.resume = Some(previous);
    let outcome = run(&config);

    assert_eq!(sorted_records(&outcome.report_path), [record("d.wav", 0, "")]);
    assert_eq!(outcome.summary.resumed, 1);
    assert_eq!(outcome.summary.validated, 0);
}

#[test]
fn test_scenario_d_ignored_extension() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(data.path().join("e.wav"), b"not a wave file").unwrap();

    let registry = builtin_registry();
    let mut options = run_config(data.path(), &out).scan;
    options.ignore.insert("wav".into());
    let mut orchestrator =
        Orchestrator::new(&registry, ResumeIndex::empty(), options, Interrupt::new());
    let mut report = ReportWriter::create(out.path(), "report.xsl").unwrap();
    let summary = orchestrator
        .run(&[data.path().to_path_buf()], &mut report)
        .unwrap();
    let path = report.finish().unwrap();

    assert!(read_records(&path).unwrap().is_empty());
    assert_eq!(summary.ignored, 1);
    assert!(!orchestrator.cache().is_cached("wav"));
    assert!(!orchestrator.cache().is_unsupported("wav"));
}

#[test]
fn test_ignore_beats_resume() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    File::create(data.path().join("e.wav")).unwrap();

    let previous = out.path().join("previous.xml");
    let mut report = ReportWriter::create_at(&previous, "report.xsl").unwrap();
    report.write("e.wav", &ValidationResult::valid()).unwrap();
    report.finish().unwrap();

    let mut config = run_config(data.path(), &out);
    config.resume = Some(previous);
    config.scan.ignore.insert("wav".into());
    let outcome = run(&config);

    assert!(read_records(&outcome.report_path).unwrap().is_empty());
    assert_eq!(outcome.summary.ignored, 1);
}

#[test]
fn test_second_run_reproduces_first() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let nested = data.path().join("nested");
    fs::create_dir(&nested).unwrap();
    fs::write(data.path().join("a.htm"), WELL_FORMED_HTML).unwrap();
    File::create(data.path().join("b.html")).unwrap();
    fs::write(nested.join("c.wav"), b"RIFF....WAVEjunk").unwrap();
    File::create(nested.join("notes.txt")).unwrap();

    let mut config = run_config(data.path(), &out);
    config.scan.recursive = true;
    let first = run(&config);

    config.resume = Some(first.report_path.clone());
    let second = run(&config);

    assert_ne!(first.report_path, second.report_path);
    assert_eq!(sorted_records(&first.report_path), sorted_records(&second.report_path));
    assert_eq!(first.summary.validated, 3);
    assert_eq!(second.summary.resumed, 3);
    assert_eq!(second.summary.validated, 0);
}

#[test]
fn test_shared_relative_name_across_roots() {
    let first_root = TempDir::new().unwrap();
    let second_root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(first_root.path().join("index.html"), WELL_FORMED_HTML).unwrap();
    File::create(second_root.path().join("index.html")).unwrap();

    let mut config = run_config(first_root.path(), &out);
    config.roots.push(second_root.path().to_path_buf());
    let first = run(&config);

    assert_eq!(sorted_records(&first.report_path), [record("index.html", 0, "")]);
    assert_eq!(first.summary.validated, 1);
    assert_eq!(first.summary.duplicates, 1);

    // The report is a usable resume source and the next run matches it
    config.resume = Some(first.report_path.clone());
    let second = run(&config);
    assert_eq!(sorted_records(&first.report_path), sorted_records(&second.report_path));
    assert_eq!(second.summary.resumed, 1);
    assert_eq!(second.summary.duplicates, 1);
}

#[test]
fn test_absolute_keys() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let file = data.path().join("a.htm");
    fs::write(&file, WELL_FORMED_HTML).unwrap();

    let mut config = run_config(data.path(), &out);
    config.scan.relative = false;
    let outcome = run(&config);

    let expected: PathBuf = std::path::absolute(&file).unwrap();
    let records = read_records(&outcome.report_path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, expected.to_string_lossy());
}

#[test]
fn test_unconfigured_video_validator_is_skipped() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    File::create(data.path().join("clip.mp4")).unwrap();
    File::create(data.path().join("other.mp4")).unwrap();

    let registry = builtin_registry();
    let options = run_config(data.path(), &out).scan;
    let mut orchestrator =
        Orchestrator::new(&registry, ResumeIndex::empty(), options, Interrupt::new());
    let mut report = ReportWriter::create(out.path(), "report.xsl").unwrap();
    let summary = orchestrator
        .run(&[data.path().to_path_buf()], &mut report)
        .unwrap();
    let path = report.finish().unwrap();

    assert!(read_records(&path).unwrap().is_empty());
    assert_eq!(summary.no_validator, 1);
    assert_eq!(summary.ignored, 1);
    assert!(orchestrator.cache().is_unsupported("mp4"));
    assert!(!orchestrator.cache().is_cached("mp4"));
}

#[test]
fn test_report_references_stylesheet() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let mut config = run_config(data.path(), &out);
    config.stylesheet = "styles/report.xsl".into();

    let outcome = run(&config);
    let content = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(content.contains("href=\"styles/report.xsl\""));
    assert!(outcome.report_path.starts_with(out.path().join("reports")));
}
