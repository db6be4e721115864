mod common;

use image::imageops;
use pixeldupe::duplicates::{AnalysisParams, AnalysisPipeline, MatchCriterion, PipelineError};
use pixeldupe::error::ExitCode;
use pixeldupe::hashing::{FileFingerprinter, HashKind};
use pixeldupe::output::{CsvOutput, JsonOutput};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

fn pipeline(params: AnalysisParams) -> AnalysisPipeline {
    AnalysisPipeline::new(params).with_threads(2)
}

#[test]
fn test_exact_copies_are_grouped_with_every_reason() {
    let dir = TempDir::new().unwrap();
    let original = common::save(dir.path(), "a.png", &common::scene(64));
    fs::copy(&original, dir.path().join("b.png")).unwrap();
    common::save(dir.path(), "c.png", &common::inverted_scene(64));

    let result = pipeline(AnalysisParams::default())
        .analyze_directory(dir.path())
        .unwrap();

    assert_eq!(result.total_images, 3);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.duplicate_images, 1);
    assert_eq!(result.groups[0].reason, "identical file+dHash+pHash+aHash");
    let reference = result.groups[0].reference().unwrap();
    assert!(reference.path.ends_with("a.png"));
    assert_eq!(ExitCode::from_result(&result), ExitCode::Success);
}

#[test]
fn test_same_size_files_differing_between_windows_are_not_identical() {
    let dir = TempDir::new().unwrap();
    let original = common::scene(200);
    let mut edited = original.clone();
    for y in 110..185 {
        for x in 0..200 {
            let p = edited.get_pixel_mut(x, y);
            p.0 = p.0.map(|c| 255 - c);
        }
    }
    let a = common::save(dir.path(), "a.bmp", &original);
    let b = common::save(dir.path(), "b.bmp", &edited);

    // Uncompressed rows keep the edit away from the sampled windows
    let bytes_a = fs::read(&a).unwrap();
    let bytes_b = fs::read(&b).unwrap();
    assert_eq!(bytes_a.len(), bytes_b.len());
    assert_ne!(bytes_a, bytes_b);
    let fingerprinter = FileFingerprinter::new();
    assert_eq!(
        fingerprinter.fingerprint(&a).unwrap(),
        fingerprinter.fingerprint(&b).unwrap()
    );

    let params = AnalysisParams::default().with_kinds(vec![HashKind::Dhash]);
    let result = pipeline(params).analyze_files(vec![a, b]).unwrap();

    assert!(result
        .groups
        .iter()
        .all(|g| !g.criteria.contains(&MatchCriterion::Exact)));
    assert!(result.groups.is_empty());
}

#[test]
fn test_identical_bmp_copies_still_match_exactly() {
    let dir = TempDir::new().unwrap();
    let a = common::save(dir.path(), "a.bmp", &common::scene(200));
    let b = dir.path().join("b.bmp");
    fs::copy(&a, &b).unwrap();

    let params = AnalysisParams::default()
        .with_kinds(vec![HashKind::Dhash])
        .with_threshold(HashKind::Dhash, 0);
    let result = pipeline(params).analyze_files(vec![a, b]).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].reason, "identical file+dHash");
}

#[test]
fn test_multi_scale_keeps_direct_matches() {
    let dir = TempDir::new().unwrap();
    let original = common::scene(256);
    let smaller = imageops::resize(&original, 160, 160, imageops::FilterType::Lanczos3);
    let a = common::save(dir.path(), "big.png", &original);
    let b = common::save(dir.path(), "small.png", &smaller);
    let c = common::save(dir.path(), "other.png", &common::inverted_scene(256));

    let params = AnalysisParams::default()
        .with_kinds(vec![HashKind::Dhash])
        .with_multi_scale(true);
    let result = pipeline(params).analyze_files(vec![a, b, c]).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
    assert_eq!(result.groups[0].reason, "dHash");
}

#[test]
fn test_resized_copy_is_grouped_by_hash() {
    let dir = TempDir::new().unwrap();
    let original = common::scene(256);
    let smaller = imageops::resize(&original, 128, 128, imageops::FilterType::Lanczos3);
    common::save(dir.path(), "big.png", &original);
    common::save(dir.path(), "small.png", &smaller);

    let params = AnalysisParams::default().with_kinds(vec![HashKind::Dhash]);
    let result = pipeline(params).analyze_directory(dir.path()).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].reason, "dHash");
    let duplicate = result.groups[0].duplicates().next().unwrap();
    assert!(duplicate.distances[&HashKind::Dhash] <= 5);
}

#[test]
fn test_rotated_copy_needs_rotation_detection() {
    let dir = TempDir::new().unwrap();
    let original = common::scene(64);
    let a = common::save(dir.path(), "a.png", &original);
    let b = common::save(dir.path(), "b.png", &imageops::rotate90(&original));
    let params = AnalysisParams::default().with_kinds(vec![HashKind::Dhash]);

    let without = pipeline(params.clone())
        .analyze_files(vec![a.clone(), b.clone()])
        .unwrap();
    assert!(without.groups.is_empty());

    let with = pipeline(params.with_rotation(true))
        .analyze_files(vec![a, b])
        .unwrap();
    assert_eq!(with.groups.len(), 1);
    assert_eq!(with.groups[0].reason, "dHash@90°");
    let duplicate = with.groups[0].duplicates().next().unwrap();
    assert_eq!(duplicate.distances[&HashKind::Dhash], 0);
}

#[test]
fn test_pure_color_images_are_reported_not_grouped() {
    let dir = TempDir::new().unwrap();
    let blank = common::save(dir.path(), "blank1.png", &common::solid(64, [250, 250, 250]));
    fs::copy(&blank, dir.path().join("blank2.png")).unwrap();
    common::save(dir.path(), "photo.png", &common::scene(64));

    let result = pipeline(AnalysisParams::default())
        .analyze_directory(dir.path())
        .unwrap();

    assert_eq!(result.total_images, 3);
    assert_eq!(result.pure_color_images, 2);
    assert!(result.groups.is_empty());
    assert_eq!(ExitCode::from_result(&result), ExitCode::NoDuplicates);
}

#[test]
fn test_pure_color_detection_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let blank = common::save(dir.path(), "blank1.png", &common::solid(64, [0, 0, 0]));
    fs::copy(&blank, dir.path().join("blank2.png")).unwrap();

    let params = AnalysisParams::default().with_pure_color(false);
    let result = pipeline(params).analyze_directory(dir.path()).unwrap();

    assert_eq!(result.pure_color_images, 0);
    assert_eq!(result.groups.len(), 1);
    assert!(result.groups[0].reason.starts_with("identical file"));
}

#[test]
fn test_broken_image_is_a_failure_not_an_abort() {
    let dir = TempDir::new().unwrap();
    let original = common::save(dir.path(), "a.png", &common::scene(64));
    fs::copy(&original, dir.path().join("b.png")).unwrap();
    fs::write(dir.path().join("broken.jpg"), b"\xff\xd8 truncated").unwrap();

    let result = pipeline(AnalysisParams::default())
        .analyze_directory(dir.path())
        .unwrap();

    assert_eq!(result.total_images, 2);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].path.ends_with("broken.jpg"));
    assert!(result.error.is_none());
    assert_eq!(ExitCode::from_result(&result), ExitCode::PartialSuccess);
}

#[test]
fn test_non_recursive_scan() {
    let dir = TempDir::new().unwrap();
    let original = common::save(dir.path(), "a.png", &common::scene(64));
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    fs::copy(&original, nested.join("b.png")).unwrap();

    let recursive = pipeline(AnalysisParams::default())
        .analyze_directory(dir.path())
        .unwrap();
    assert_eq!(recursive.total_images, 2);
    assert_eq!(recursive.groups.len(), 1);

    let flat = pipeline(AnalysisParams::default().with_recursive(false))
        .analyze_directory(dir.path())
        .unwrap();
    assert_eq!(flat.total_images, 1);
    assert!(flat.groups.is_empty());
}

#[test]
fn test_interrupted_before_start() {
    let dir = TempDir::new().unwrap();
    common::save(dir.path(), "a.png", &common::scene(64));

    let result = pipeline(AnalysisParams::default())
        .with_shutdown_flag(Arc::new(AtomicBool::new(true)))
        .analyze_directory(dir.path());
    assert!(matches!(result, Err(PipelineError::Interrupted)));
}

#[test]
fn test_reports_render_for_real_result() {
    let dir = TempDir::new().unwrap();
    let original = common::save(dir.path(), "a.png", &common::scene(64));
    fs::copy(&original, dir.path().join("b.png")).unwrap();

    let result = pipeline(AnalysisParams::default())
        .analyze_directory(dir.path())
        .unwrap();

    let json = JsonOutput::new(&result, ExitCode::from_result(&result))
        .to_json()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["summary"]["total_images"], 2);
    assert_eq!(value["summary"]["duplicate_groups"], 1);
    assert_eq!(value["groups"][0]["members"][1]["distances"]["dhash"], 0);
    assert_eq!(value["groups"][0]["criteria"][0]["type"], "exact");

    let csv = CsvOutput::new(&result.groups).to_string().unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[2].ends_with(",false,0,0,0"));
}
