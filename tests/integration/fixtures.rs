//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating a temporary front-end project with every source kind
//! - A fake toolchain that stands in for the external compilers and linters
//! - Running a target end to end

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use shoal::config::{BuildContext, Config, Mode};
use shoal::core::Target;
use shoal::orchestration::{RunSummary, Scheduler};
use shoal::tools::{LintViolation, Severity, Toolchain};
use shoal::{Error, Result};

/// A throwaway project laid out like a real one.
pub struct TestProject {
    /// Keeps the directory alive for the duration of the test.
    pub temp_dir: TempDir,
    /// Project root.
    pub path: PathBuf,
    pub config: Config,
}

impl TestProject {
    /// Create a project with one template, one stylesheet, one script, one
    /// image and one icon.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().to_path_buf();
        let project = Self {
            temp_dir,
            path,
            config: Config::default(),
        };

        project.write("src/pug/index.pug", "doctype html\nbody\n  .fish");
        project.write("src/pug/partials/head.pug", "title Fish");
        project.write("src/scss/main.scss", "@use 'base';\n.fish { color: teal; }");
        project.write("src/scss/_base.scss", "body { margin: 0; }");
        project.write("src/js/app.js", "console.log('fish');");
        project.write("src/img/fish.png", "PNG");
        project.write("src/icons/fin.svg", "<svg/>");
        project
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path.join(relative);
        fs::create_dir_all(path.parent().expect("relative path has a parent"))
            .expect("Failed to create directories");
        fs::write(&path, contents).expect("Failed to write file");
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path.join(relative))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative, e))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path.join(relative).exists()
    }

    pub fn remove_dir(&self, relative: &str) {
        fs::remove_dir_all(self.path.join(relative)).expect("Failed to remove directory");
    }

    pub fn context(&self, mode: Mode) -> Arc<BuildContext> {
        Arc::new(BuildContext::new(&self.path, self.config.clone(), mode))
    }
}

/// Deterministic stand-in for pug, sass, esbuild and friends.
///
/// Output embeds the source file name and mode so tests can tell which
/// step produced a file.
#[derive(Default)]
pub struct FakeToolchain {
    pub view_findings: Mutex<Vec<LintViolation>>,
    pub style_findings: Mutex<Vec<LintViolation>>,
    pub fail_views: bool,
    pub image_runs: AtomicUsize,
    pub postprocess_runs: AtomicUsize,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view_finding(self, file: &Path) -> Self {
        self.view_findings
            .lock()
            .unwrap()
            .push(finding(file, "Attribute must be quoted", "validateAttributeQuoteMarks"));
        self
    }

    pub fn with_style_finding(self, file: &Path) -> Self {
        self.style_findings
            .lock()
            .unwrap()
            .push(finding(file, "Unexpected empty block", "block-no-empty"));
        self
    }

    pub fn image_runs(&self) -> usize {
        self.image_runs.load(Ordering::SeqCst)
    }
}

pub fn finding(file: &Path, message: &str, rule: &str) -> LintViolation {
    LintViolation {
        file: file.to_path_buf(),
        line: Some(3),
        column: Some(5),
        rule: Some(rule.to_string()),
        severity: Severity::Error,
        message: message.to_string(),
    }
}

fn tagged(tag: &str, source: &Path, mode: Mode) -> Vec<u8> {
    let name = source.file_name().unwrap_or_default().to_string_lossy();
    format!("{}:{}:{}", tag, name, mode).into_bytes()
}

impl Toolchain for FakeToolchain {
    fn compile_view(&self, source: &Path, mode: Mode) -> Result<Vec<u8>> {
        if self.fail_views {
            return Err(Error::ToolFailed {
                tool: "pug".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "unexpected token".to_string(),
            });
        }
        let body = String::from_utf8_lossy(&tagged("html", source, mode)).into_owned();
        Ok(format!("<html><body>{}</body></html>", body).into_bytes())
    }

    fn compile_stylesheet(&self, entry: &Path, mode: Mode) -> Result<Vec<u8>> {
        Ok(tagged("css", entry, mode))
    }

    fn postprocess_css(&self, css: &[u8]) -> Result<Vec<u8>> {
        self.postprocess_runs.fetch_add(1, Ordering::SeqCst);
        let mut out = b"min:".to_vec();
        out.extend_from_slice(css);
        Ok(out)
    }

    fn bundle_script(&self, entry: &Path, mode: Mode) -> Result<Vec<u8>> {
        Ok(tagged("js", entry, mode))
    }

    fn optimize_image(&self, source: &Path) -> Result<Vec<u8>> {
        self.image_runs.fetch_add(1, Ordering::SeqCst);
        Ok(tagged("img", source, Mode::Production))
    }

    fn optimize_icon(&self, source: &Path) -> Result<Vec<u8>> {
        Ok(tagged("svg", source, Mode::Production))
    }

    fn lint_views(&self, _files: &[PathBuf]) -> Result<Vec<LintViolation>> {
        Ok(self.view_findings.lock().unwrap().clone())
    }

    fn lint_styles(&self, _files: &[PathBuf]) -> Result<Vec<LintViolation>> {
        Ok(self.style_findings.lock().unwrap().clone())
    }
}

/// Run `target` against the project and return the summary.
pub async fn run_target(
    project: &TestProject,
    target: Target,
    mode: Mode,
    tools: Arc<FakeToolchain>,
) -> RunSummary {
    let dag = target
        .composition()
        .to_dag()
        .expect("target composition is acyclic");
    Scheduler::new(dag, project.context(mode), tools)
        .run()
        .await
        .expect("scheduler run")
}
