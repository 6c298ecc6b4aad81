//! Lint behaviour in development and production.
//!
//! Development reports findings and keeps going; production fails the lint
//! task, which fails the run.

use std::sync::Arc;

use shoal::config::Mode;
use shoal::core::{TaskKind, TaskStatus, Target};
use shoal::tools::LintViolation;

use crate::fixtures::{run_target, FakeToolchain, TestProject};

/// Test: Production lint is fatal
/// Given a template with a lint violation
/// When `lint` runs in production
/// Then the views lint task fails
#[tokio::test]
async fn test_production_view_violation_fails_lint() {
    let project = TestProject::new();
    let tools = Arc::new(
        FakeToolchain::new().with_view_finding(&project.path.join("src/pug/index.pug")),
    );

    let summary = run_target(&project, Target::Lint, Mode::Production, tools).await;

    assert!(!summary.is_success());
    let failed = summary.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, TaskKind::LintViews);
    match &failed[0].status {
        TaskStatus::Failed { error } => {
            assert_eq!(error, "pug-lint reported 1 violation(s)")
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert!(!project.exists("reports/pug-lint.txt"));
}

/// Test: Production build fails on lint
/// Given the same violation
/// When `build` runs in production
/// Then the run is not successful even though every output was written
#[tokio::test]
async fn test_production_build_fails_on_view_lint() {
    let project = TestProject::new();
    let tools = Arc::new(
        FakeToolchain::new().with_view_finding(&project.path.join("src/pug/index.pug")),
    );

    let summary = run_target(&project, Target::Build, Mode::Production, tools).await;

    assert!(!summary.is_success());
    assert!(project.exists("dist/index.html"));
}

/// Test: Development lint is advisory
/// Given the same violation
/// When `lint` runs in development
/// Then the run succeeds and the finding is saved to the report file
#[tokio::test]
async fn test_development_view_violation_is_reported() {
    let project = TestProject::new();
    let tools = Arc::new(
        FakeToolchain::new().with_view_finding(&project.path.join("src/pug/index.pug")),
    );

    let summary = run_target(&project, Target::Lint, Mode::Development, tools).await;

    assert!(summary.is_success());
    let lint = summary.of_kind(TaskKind::LintViews);
    assert_eq!(lint[0].output.unwrap().violations, 1);
    let report = project.read("reports/pug-lint.txt");
    assert!(report.contains("index.pug:3:5 Attribute must be quoted"));
}

/// Test: Clean templates leave no report
/// Given templates without findings
/// When `lint-views` runs in development
/// Then the run succeeds and no report file is written
#[tokio::test]
async fn test_development_clean_views_write_no_report() {
    let project = TestProject::new();

    let summary = run_target(
        &project,
        Target::LintViews,
        Mode::Development,
        Arc::new(FakeToolchain::new()),
    )
    .await;

    assert!(summary.is_success());
    assert!(!project.exists("reports/pug-lint.txt"));
}

/// Test: Stylesheet findings in development
/// Given a stylesheet lint violation
/// When `lint-styles` runs in development
/// Then the JSON report round-trips to the same findings
#[tokio::test]
async fn test_development_style_report_is_json() {
    let project = TestProject::new();
    let scss = project.path.join("src/scss/main.scss");
    let tools = Arc::new(FakeToolchain::new().with_style_finding(&scss));

    let summary = run_target(&project, Target::LintStyles, Mode::Development, tools).await;

    assert!(summary.is_success());
    let saved: Vec<LintViolation> =
        serde_json::from_str(&project.read("reports/stylelint.json")).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].file, scss);
    assert_eq!(saved[0].rule.as_deref(), Some("block-no-empty"));
}

/// Test: Stylesheet lint gates the styles build in production
/// Given a stylesheet violation
/// When `build` runs in production
/// Then lint-styles fails and nothing downstream of it runs
#[tokio::test]
async fn test_production_style_violation_blocks_build() {
    let project = TestProject::new();
    let tools = Arc::new(
        FakeToolchain::new().with_style_finding(&project.path.join("src/scss/main.scss")),
    );

    let summary = run_target(&project, Target::Build, Mode::Production, tools).await;

    assert_eq!(summary.failed().len(), 1);
    assert_eq!(summary.failed()[0].kind, TaskKind::LintStyles);
    assert_eq!(summary.blocked().len(), 8);
    assert!(!project.exists("dist/index.html"));
}
