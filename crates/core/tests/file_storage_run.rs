//! Full runs over PNG folders with the pixel comparator

use std::path::Path;
use std::sync::Arc;

use image::Rgba;
use kobold_core::{
    CaseStatus, FailureKind, Image, KoboldConfig, Orchestrator, RecordingHarness, StorageConfig,
};

fn write_screen(dir: &Path, name: &str, image: &Image) {
    std::fs::create_dir_all(dir).unwrap();
    image.save(dir.join(format!("{}.png", name))).unwrap();
}

fn config(root: &Path) -> KoboldConfig {
    KoboldConfig {
        build: "ci-1".to_string(),
        storage: StorageConfig {
            path: root.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn compares_and_archives_png_folders() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let approved = root.join("approved");
    let build = root.join("build");

    let gray = Image::from_pixel(20, 10, Rgba([128, 128, 128, 255]));
    let mut tweaked = gray.clone();
    tweaked.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
    let black = Image::from_pixel(20, 10, Rgba([0, 0, 0, 255]));

    write_screen(&approved, "home", &gray);
    write_screen(&build, "home", &gray);
    write_screen(&approved, "profile_page", &gray);
    write_screen(&build, "profile_page", &tweaked);
    write_screen(&approved, "checkout", &gray);
    write_screen(&build, "checkout", &black);
    write_screen(&approved, "retired", &gray);
    write_screen(&build, "brand-new", &gray);

    let harness = Arc::new(RecordingHarness::new());
    let summary = Orchestrator::from_config(config(root), harness.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.build, "ci-1");
    assert_eq!(summary.total, 5);
    assert_eq!(harness.report_for("home").unwrap().status, CaseStatus::Passed);
    // 1 of 200 pixels is within the default 0.5% threshold
    let profile = harness.report_for("profile_page").unwrap();
    assert_eq!(profile.status, CaseStatus::Passed);
    assert_eq!(profile.display_name, "profile - page");

    let checkout = harness.report_for("checkout").unwrap();
    assert_eq!(checkout.status, CaseStatus::Failed);
    assert_eq!(checkout.failure.unwrap().kind, FailureKind::ScreensDifferent);

    assert_eq!(harness.report_for("retired").unwrap().status, CaseStatus::Skipped);
    assert_eq!(harness.report_for("brand-new").unwrap().status, CaseStatus::Skipped);

    let archive = root.join("archive").join("ci-1");
    assert!(archive.join("approved").join("home.png").exists());
    assert!(archive.join("build").join("home.png").exists());
    assert!(!archive.join("highlight").join("home.png").exists());
    assert!(!archive.join("highlight").join("profile_page.png").exists());
    assert!(archive.join("highlight").join("checkout.png").exists());
    assert!(!archive.join("build").join("retired.png").exists());
}

#[tokio::test]
async fn screen_config_overrides_global_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let approved = root.join("approved");

    let white = Image::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
    let mut changed = white.clone();
    for x in 0..10 {
        changed.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
    }

    write_screen(&approved, "banner", &white);
    write_screen(&root.join("build"), "banner", &changed);
    std::fs::write(approved.join("banner.json"), r#"{ "threshold": 15.0 }"#).unwrap();

    let harness = Arc::new(RecordingHarness::new());
    let summary = Orchestrator::from_config(config(root), harness.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(summary.success());
    assert_eq!(harness.report_for("banner").unwrap().status, CaseStatus::Passed);
}

#[tokio::test]
async fn missing_folders_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Arc::new(RecordingHarness::new());

    let result = Orchestrator::from_config(config(dir.path()), harness.clone())
        .unwrap()
        .run()
        .await;

    assert!(result.is_err());
    assert_eq!(harness.aborts().len(), 1);
    assert!(harness.reports().is_empty());
}
