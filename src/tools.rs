//! External tool invocation.
//!
//! Template compilation, CSS compilation, bundling, image optimization and
//! linting are done by external programs. [`Toolchain`] is the seam between
//! the pipeline and those programs; [`ExternalToolchain`] runs the command
//! lines from the `[tools]` config section.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::Mode;
use crate::{slog_debug, slog_trace, slog_warn, Error, Result};

/// Placeholder replaced by the single input path.
pub const INPUT: &str = "{input}";
/// Placeholder expanded to every input path, one argument each.
pub const INPUTS: &str = "{inputs}";

/// Command line of one external tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra arguments appended in development mode.
    #[serde(default)]
    pub development: Vec<String>,
    /// Extra arguments appended in production mode.
    #[serde(default)]
    pub production: Vec<String>,
    /// Feed the input file's content on stdin.
    #[serde(default)]
    pub stdin: bool,
}

impl ToolSpec {
    fn npx(args: &[&str]) -> Self {
        Self {
            program: "npx".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            development: Vec::new(),
            production: Vec::new(),
            stdin: false,
        }
    }

    fn with_development(mut self, args: &[&str]) -> Self {
        self.development = args.iter().map(|a| a.to_string()).collect();
        self
    }

    fn with_production(mut self, args: &[&str]) -> Self {
        self.production = args.iter().map(|a| a.to_string()).collect();
        self
    }

    fn with_stdin(mut self) -> Self {
        self.stdin = true;
        self
    }

    /// Expand placeholders and append the mode-specific arguments.
    pub fn command_args(&self, mode: Mode, inputs: &[PathBuf]) -> Vec<String> {
        let extra = match mode {
            Mode::Development => &self.development,
            Mode::Production => &self.production,
        };
        let first = inputs
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut out = Vec::new();
        for arg in self.args.iter().chain(extra.iter()) {
            if arg == INPUTS {
                out.extend(inputs.iter().map(|p| p.display().to_string()));
            } else {
                out.push(arg.replace(INPUT, &first));
            }
        }
        out
    }
}

/// Command lines for every external tool the pipeline uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub views: ToolSpec,
    pub styles: ToolSpec,
    pub postcss: ToolSpec,
    pub scripts: ToolSpec,
    pub images: ToolSpec,
    pub icons: ToolSpec,
    pub lint_views: ToolSpec,
    pub lint_styles: ToolSpec,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            views: ToolSpec::npx(&["pug", "--silent", "--path", INPUT])
                .with_development(&["--pretty"])
                .with_stdin(),
            styles: ToolSpec::npx(&["sass", "--load-path=node_modules", INPUT])
                .with_development(&["--embed-source-map"])
                .with_production(&["--no-source-map"]),
            postcss: ToolSpec::npx(&[
                "postcss",
                "--use",
                "autoprefixer",
                "--use",
                "cssnano",
                "--no-map",
            ])
            .with_stdin(),
            scripts: ToolSpec::npx(&["esbuild", INPUT, "--bundle"])
                .with_development(&["--sourcemap=inline"])
                .with_production(&["--minify"]),
            images: ToolSpec::npx(&[
                "imagemin",
                INPUT,
                "--plugin=gifsicle",
                "--plugin=jpegtran",
                "--plugin=optipng",
            ]),
            // svgo 4 keeps viewBox and collapses groups in its default preset.
            icons: ToolSpec::npx(&["svgo@4", "--input", INPUT, "--output", "-"]),
            lint_views: ToolSpec::npx(&["pug-lint", "--reporter", "inline", INPUTS]),
            lint_styles: ToolSpec::npx(&["stylelint", "--formatter", "json", INPUTS]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding reported by a linter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintViolation {
    pub file: PathBuf,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub rule: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for LintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        write!(f, " {}", self.message)?;
        if let Some(rule) = &self.rule {
            write!(f, " ({})", rule)?;
        }
        Ok(())
    }
}

/// The external collaborators of the pipeline.
///
/// Methods are blocking; the pipeline calls them from `spawn_blocking`.
pub trait Toolchain: Send + Sync {
    /// Compile one template to HTML.
    fn compile_view(&self, source: &Path, mode: Mode) -> Result<Vec<u8>>;

    /// Compile one stylesheet entry to CSS.
    fn compile_stylesheet(&self, entry: &Path, mode: Mode) -> Result<Vec<u8>>;

    /// Vendor-prefix and minify compiled CSS.
    fn postprocess_css(&self, css: &[u8]) -> Result<Vec<u8>>;

    /// Bundle the script entry into a single file.
    fn bundle_script(&self, entry: &Path, mode: Mode) -> Result<Vec<u8>>;

    /// Losslessly/lossily compress a raster image.
    fn optimize_image(&self, source: &Path) -> Result<Vec<u8>>;

    /// Optimize an SVG icon.
    fn optimize_icon(&self, source: &Path) -> Result<Vec<u8>>;

    fn lint_views(&self, files: &[PathBuf]) -> Result<Vec<LintViolation>>;

    fn lint_styles(&self, files: &[PathBuf]) -> Result<Vec<LintViolation>>;
}

/// Runs the configured command lines as child processes.
#[derive(Debug, Clone)]
pub struct ExternalToolchain {
    tools: ToolsConfig,
    cwd: PathBuf,
}

impl ExternalToolchain {
    pub fn new(tools: ToolsConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            cwd: cwd.into(),
        }
    }

    fn run(
        &self,
        name: &str,
        spec: &ToolSpec,
        mode: Mode,
        inputs: &[PathBuf],
        stdin: Option<Vec<u8>>,
    ) -> Result<Output> {
        let program =
            which::which(&spec.program).map_err(|_| Error::ToolNotFound(spec.program.clone()))?;
        let args = spec.command_args(mode, inputs);
        slog_debug!(
            "tool {} -> {} {}",
            name,
            program.display(),
            args.join(" ")
        );

        let mut child = Command::new(&program)
            .args(&args)
            .current_dir(&self.cwd)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is fed on its own thread while stdout drains.
        let writer = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => Some(std::thread::spawn(move || {
                let _ = pipe.write_all(&bytes);
            })),
            _ => None,
        };
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        slog_trace!(
            "tool {} status={} stdout={}B stderr={}",
            name,
            output.status,
            output.stdout.len(),
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(output)
    }

    /// Run a transforming tool and return its stdout, failing on a non-zero exit.
    fn transform(
        &self,
        name: &str,
        spec: &ToolSpec,
        mode: Mode,
        input: &Path,
        stdin: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        if !input.exists() {
            return Err(Error::SourceNotFound(input.to_path_buf()));
        }
        let stdin = match stdin {
            Some(bytes) => Some(bytes),
            None if spec.stdin => Some(std::fs::read(input)?),
            None => None,
        };
        let output = self.run(name, spec, mode, &[input.to_path_buf()], stdin)?;
        if !output.status.success() {
            return Err(tool_failed(&spec.program, &output));
        }
        Ok(output.stdout)
    }
}

fn tool_failed(program: &str, output: &Output) -> Error {
    Error::ToolFailed {
        tool: program.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

impl Toolchain for ExternalToolchain {
    fn compile_view(&self, source: &Path, mode: Mode) -> Result<Vec<u8>> {
        self.transform("views", &self.tools.views, mode, source, None)
    }

    fn compile_stylesheet(&self, entry: &Path, mode: Mode) -> Result<Vec<u8>> {
        self.transform("styles", &self.tools.styles, mode, entry, None)
    }

    fn postprocess_css(&self, css: &[u8]) -> Result<Vec<u8>> {
        let output = self.run(
            "postcss",
            &self.tools.postcss,
            Mode::Production,
            &[],
            Some(css.to_vec()),
        )?;
        if !output.status.success() {
            return Err(tool_failed(&self.tools.postcss.program, &output));
        }
        Ok(output.stdout)
    }

    fn bundle_script(&self, entry: &Path, mode: Mode) -> Result<Vec<u8>> {
        self.transform("scripts", &self.tools.scripts, mode, entry, None)
    }

    fn optimize_image(&self, source: &Path) -> Result<Vec<u8>> {
        self.transform("images", &self.tools.images, Mode::Production, source, None)
    }

    fn optimize_icon(&self, source: &Path) -> Result<Vec<u8>> {
        self.transform("icons", &self.tools.icons, Mode::Production, source, None)
    }

    fn lint_views(&self, files: &[PathBuf]) -> Result<Vec<LintViolation>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let spec = &self.tools.lint_views;
        let output = self.run("lint_views", spec, Mode::Development, files, None)?;
        let text = String::from_utf8_lossy(&output.stdout);
        let violations = parse_inline_report(&text);
        if violations.is_empty() && !output.status.success() {
            return Err(tool_failed(&spec.program, &output));
        }
        Ok(violations)
    }

    fn lint_styles(&self, files: &[PathBuf]) -> Result<Vec<LintViolation>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let spec = &self.tools.lint_styles;
        let output = self.run("lint_styles", spec, Mode::Development, files, None)?;
        // Newer stylelint releases print formatter output on stderr.
        let raw = if output.stdout.iter().any(|b| !b.is_ascii_whitespace()) {
            &output.stdout
        } else {
            &output.stderr
        };
        match parse_stylelint_json(&String::from_utf8_lossy(raw)) {
            Ok(violations) => Ok(violations),
            Err(e) if output.status.success() => {
                slog_warn!("stylelint output was not JSON: {}", e);
                Ok(Vec::new())
            }
            Err(_) => Err(tool_failed(&spec.program, &output)),
        }
    }
}

fn inline_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<file>.+?):(?P<line>\d+):(?P<column>\d+)\s+(?P<message>.+)$")
            .expect("static regex")
    })
}

/// Parse `file:line:column message` lines as printed by pug-lint's inline reporter.
pub fn parse_inline_report(text: &str) -> Vec<LintViolation> {
    text.lines()
        .filter_map(|line| {
            let caps = inline_line_regex().captures(line.trim())?;
            Some(LintViolation {
                file: PathBuf::from(&caps["file"]),
                line: caps["line"].parse().ok(),
                column: caps["column"].parse().ok(),
                rule: None,
                severity: Severity::Error,
                message: caps["message"].trim().to_string(),
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct StylelintResult {
    source: PathBuf,
    #[serde(default)]
    warnings: Vec<StylelintWarning>,
}

#[derive(Deserialize)]
struct StylelintWarning {
    line: Option<u32>,
    column: Option<u32>,
    rule: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    text: String,
}

/// Parse stylelint's JSON formatter output.
pub fn parse_stylelint_json(text: &str) -> Result<Vec<LintViolation>> {
    let results: Vec<StylelintResult> = serde_json::from_str(text.trim())?;
    Ok(results
        .into_iter()
        .flat_map(|result| {
            let source = result.source;
            result.warnings.into_iter().map(move |w| LintViolation {
                file: source.clone(),
                line: w.line,
                column: w.column,
                rule: w.rule,
                severity: match w.severity.as_deref() {
                    Some("warning") => Severity::Warning,
                    _ => Severity::Error,
                },
                message: w.text,
            })
        })
        .collect())
}
