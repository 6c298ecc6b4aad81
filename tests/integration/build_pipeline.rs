//! End-to-end build tests.
//!
//! These run the real targets through the scheduler against a temporary
//! project, with the fake toolchain in place of the external tools.

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use filetime::FileTime;

use shoal::config::Mode;
use shoal::core::{TaskKind, TaskStatus, Target};

use crate::fixtures::{run_target, FakeToolchain, TestProject};

/// Test: Full development build
/// Given a project with every source kind
/// When `build` runs in development
/// Then every output lands under dist and every task completes
#[tokio::test]
async fn test_full_build_development() {
    let project = TestProject::new();
    let tools = Arc::new(FakeToolchain::new());

    let summary = run_target(&project, Target::Build, Mode::Development, tools.clone()).await;

    assert!(summary.is_success(), "failed: {:?}", summary.failed());
    assert_eq!(summary.results.len(), 10);
    assert!(project.read("dist/index.html").contains("html:index.pug:development"));
    assert!(!project.exists("dist/partials/head.html"));
    assert_eq!(project.read("dist/css/main.css"), "css:main.scss:development");
    assert_eq!(project.read("dist/js/app.min.js"), "js:app.js:development");
    // Development copies assets as they are.
    assert_eq!(project.read("dist/img/fish.png"), "PNG");
    assert_eq!(project.read("dist/icons/fin.svg"), "<svg/>");
    assert_eq!(tools.postprocess_runs.load(Ordering::SeqCst), 0);
}

/// Test: Production build optimizes
/// Given the same project
/// When `build` runs in production
/// Then CSS is post-processed and assets go through the optimizers
#[tokio::test]
async fn test_full_build_production() {
    let project = TestProject::new();
    let tools = Arc::new(FakeToolchain::new());

    let summary = run_target(&project, Target::Build, Mode::Production, tools.clone()).await;

    assert!(summary.is_success(), "failed: {:?}", summary.failed());
    assert_eq!(project.read("dist/css/main.css"), "min:css:main.scss:production");
    assert_eq!(project.read("dist/img/fish.png"), "img:fish.png:production");
    assert_eq!(project.read("dist/icons/fin.svg"), "svg:fin.svg:production");
    assert_eq!(tools.image_runs(), 1);
}

/// Test: Styles are reproducible
/// Given unchanged sources
/// When `build-styles` runs twice
/// Then the CSS is byte-identical
#[tokio::test]
async fn test_build_styles_is_idempotent() {
    let project = TestProject::new();
    let tools = Arc::new(FakeToolchain::new());

    run_target(&project, Target::BuildStyles, Mode::Production, tools.clone()).await;
    let first = fs::read(project.path.join("dist/css/main.css")).unwrap();
    run_target(&project, Target::BuildStyles, Mode::Production, tools.clone()).await;
    let second = fs::read(project.path.join("dist/css/main.css")).unwrap();

    assert_eq!(first, second);
}

/// Test: Multiple stylesheet entries
/// Given two entries listed in either order
/// When `build-styles` runs
/// Then both produce their own CSS file
#[tokio::test]
async fn test_two_stylesheet_entries_either_order() {
    for entries in [
        ["src/scss/main.scss", "src/scss/print.scss"],
        ["src/scss/print.scss", "src/scss/main.scss"],
    ] {
        let mut project = TestProject::new();
        project.write("src/scss/print.scss", "@media print {}");
        project.config.entry.styles = entries.iter().map(|e| e.to_string()).collect();
        let tools = Arc::new(FakeToolchain::new());

        let summary =
            run_target(&project, Target::BuildStyles, Mode::Development, tools).await;

        assert!(summary.is_success());
        assert_eq!(summary.results[0].output.unwrap().written, 2);
        assert!(project.exists("dist/css/main.css"));
        assert!(project.exists("dist/css/print.css"));
    }
}

/// Test: Clean build
/// Given stale files in dist
/// When `build` runs
/// Then only freshly built files remain
#[tokio::test]
async fn test_build_removes_stale_output() {
    let project = TestProject::new();
    project.write("dist/old.html", "<p>old</p>");
    project.write("dist/css/removed.css", "a{}");
    let tools = Arc::new(FakeToolchain::new());

    let summary = run_target(&project, Target::Build, Mode::Development, tools).await;

    assert!(summary.is_success());
    assert!(!project.exists("dist/old.html"));
    assert!(!project.exists("dist/css/removed.css"));
    assert!(project.exists("dist/css/main.css"));
}

/// Test: Unchanged assets are skipped
/// Given images already optimized
/// When `build-images` runs again without source changes
/// Then the optimizer is not invoked and the output mtime is kept
#[tokio::test]
async fn test_unchanged_images_not_reprocessed() {
    let project = TestProject::new();
    let tools = Arc::new(FakeToolchain::new());
    let source = project.path.join("src/img/fish.png");
    let output = project.path.join("dist/img/fish.png");

    run_target(&project, Target::BuildImages, Mode::Production, tools.clone()).await;
    assert_eq!(tools.image_runs(), 1);

    // Make the output clearly newer than the source.
    filetime::set_file_mtime(&source, FileTime::from_unix_time(1_000_000, 0)).unwrap();
    filetime::set_file_mtime(&output, FileTime::from_unix_time(2_000_000, 0)).unwrap();

    let summary =
        run_target(&project, Target::BuildImages, Mode::Production, tools.clone()).await;
    assert_eq!(tools.image_runs(), 1);
    assert_eq!(summary.results[0].output.unwrap().skipped, 1);
    let mtime = FileTime::from_last_modification_time(&fs::metadata(&output).unwrap());
    assert_eq!(mtime, FileTime::from_unix_time(2_000_000, 0));

    // Touching the source makes it eligible again.
    filetime::set_file_mtime(&source, FileTime::from_unix_time(3_000_000, 0)).unwrap();
    run_target(&project, Target::BuildImages, Mode::Production, tools.clone()).await;
    assert_eq!(tools.image_runs(), 2);
}

/// Test: Missing sources fail without panicking
/// Given a project with no icons directory
/// When `build` runs
/// Then the icons task fails with a typed error and everything else completes
#[tokio::test]
async fn test_missing_source_fails_task_only() {
    let project = TestProject::new();
    project.remove_dir("src/icons");
    let tools = Arc::new(FakeToolchain::new());

    let summary = run_target(&project, Target::Build, Mode::Development, tools).await;

    assert!(!summary.is_success());
    let failed = summary.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, TaskKind::Icons);
    match &failed[0].status {
        TaskStatus::Failed { error } => assert!(error.contains("Source not found")),
        other => panic!("unexpected status {:?}", other),
    }
    // LintViews runs after Icons in the series, so it never starts.
    assert_eq!(summary.blocked().len(), 1);
    assert_eq!(summary.blocked()[0].kind, TaskKind::LintViews);
    assert!(project.exists("dist/js/app.min.js"));
}

/// Test: Tool failure blocks downstream stages
/// Given a template compiler that always fails
/// When `build` runs
/// Then nothing after Views runs
#[tokio::test]
async fn test_tool_failure_blocks_later_stages() {
    let project = TestProject::new();
    let tools = Arc::new(FakeToolchain {
        fail_views: true,
        ..FakeToolchain::default()
    });

    let summary = run_target(&project, Target::Build, Mode::Development, tools).await;

    assert_eq!(summary.failed().len(), 1);
    assert_eq!(summary.failed()[0].kind, TaskKind::Views);
    assert_eq!(summary.blocked().len(), 7);
    assert!(!project.exists("dist/css/main.css"));
}
