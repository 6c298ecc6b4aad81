//! Project configuration and environment mode.
//!
//! Configuration is read once at startup from `shoal.toml` (or a JSON file
//! with the same shape) and bundled with the [`Mode`] into a
//! [`BuildContext`] that every task receives. Nothing re-reads the
//! environment after that.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::sources::glob_base;
use crate::tools::ToolsConfig;
use crate::{slog_debug, Error, Result};

/// File names probed by [`Config::discover`], in order.
pub const CONFIG_FILES: [&str; 2] = ["shoal.toml", "config.json"];

/// Environment variable selecting the build mode.
pub const MODE_ENV: &str = "NODE_ENV";

/// Development (lenient, pretty, source maps) or production (strict, minified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    /// Read the mode from `NODE_ENV`.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MODE_ENV).ok().as_deref())
    }

    /// Unset, empty, or `"development"` is development; anything else is production.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            None | Some("") | Some("development") => Mode::Development,
            Some(_) => Mode::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Mode::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Mode::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry points that are compiled individually rather than globbed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EntryConfig {
    /// Stylesheet entries, each compiled to its own CSS file.
    #[serde(alias = "scss")]
    pub styles: Vec<String>,
    /// Script entry handed to the bundler.
    #[serde(alias = "js")]
    pub script: String,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            styles: vec!["src/scss/main.scss".to_string()],
            script: "src/js/app.js".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// File name of the script bundle inside `paths.dist.js`.
    #[serde(alias = "js")]
    pub script: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            script: "app.min.js".to_string(),
        }
    }
}

/// Source glob patterns, one per asset group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcePaths {
    #[serde(alias = "pug")]
    pub views: String,
    #[serde(alias = "scss")]
    pub styles: String,
    #[serde(alias = "js")]
    pub scripts: String,
    #[serde(alias = "img")]
    pub images: String,
    pub icons: String,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            views: "src/pug/*.pug".to_string(),
            styles: "src/scss/**/*.scss".to_string(),
            scripts: "src/js/**/*.js".to_string(),
            images: "src/img/**/*.{png,jpg,jpeg,gif}".to_string(),
            icons: "src/icons/**/*.svg".to_string(),
        }
    }
}

/// Output directories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistPaths {
    pub base: String,
    pub css: String,
    pub js: String,
    #[serde(alias = "img")]
    pub images: String,
    pub icons: String,
}

impl Default for DistPaths {
    fn default() -> Self {
        Self {
            base: "dist".to_string(),
            css: "dist/css".to_string(),
            js: "dist/js".to_string(),
            images: "dist/img".to_string(),
            icons: "dist/icons".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PathsConfig {
    pub src: SourcePaths,
    pub dist: DistPaths,
}

/// Where development lint reports are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportsConfig {
    pub path: String,
    pub output: ReportFiles,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            path: "reports".to_string(),
            output: ReportFiles::default(),
        }
    }
}

/// Report file names, relative to `reports.path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportFiles {
    /// Text report of template lint.
    #[serde(alias = "puglint", alias = "pug-lint")]
    pub views: String,
    /// JSON report of stylesheet lint.
    #[serde(alias = "stylelint")]
    pub styles: String,
}

impl Default for ReportFiles {
    fn default() -> Self {
        Self {
            views: "pug-lint.txt".to_string(),
            styles: "stylelint.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    /// Repeated events for the same path inside this window are dropped.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub entry: EntryConfig,
    pub output: OutputConfig,
    #[serde(alias = "path")]
    pub paths: PathsConfig,
    pub reports: ReportsConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Load a config file. `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        slog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => toml::from_str(&raw)?,
        };
        config.validate()?;
        slog_debug!(
            "Config loaded: styles={:?}, script={}, dist={}",
            config.entry.styles,
            config.entry.script,
            config.paths.dist.base
        );
        Ok(config)
    }

    /// Look for a known config file in `root`, falling back to defaults.
    pub fn discover(root: &Path) -> Result<Self> {
        for name in CONFIG_FILES {
            let candidate = root.join(name);
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        slog_debug!("No config file in {}, using defaults", root.display());
        Ok(Self::default())
    }

    /// Source patterns and entry files, in no particular order.
    fn source_patterns(&self) -> impl Iterator<Item = &str> {
        let src = &self.paths.src;
        [&src.views, &src.styles, &src.scripts, &src.images, &src.icons]
            .into_iter()
            .chain(self.entry.styles.iter())
            .chain(std::iter::once(&self.entry.script))
            .map(String::as_str)
    }

    /// Reject configurations that would make `EmptyDist` destructive or leave
    /// tasks without inputs.
    ///
    /// `paths.dist.base` must be a relative directory strictly inside the
    /// project that holds no sources.
    pub fn validate(&self) -> Result<()> {
        let raw = self.paths.dist.base.trim();
        if Path::new(raw)
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        {
            return Err(Error::Config(format!(
                "paths.dist.base must be relative to the project, got {:?}",
                self.paths.dist.base
            )));
        }
        if Path::new(raw)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::Config(format!(
                "paths.dist.base must stay inside the project, got {:?}",
                self.paths.dist.base
            )));
        }
        let dist = normalize(Path::new(raw));
        if dist.as_os_str().is_empty() {
            return Err(Error::Config(format!(
                "paths.dist.base must name a dedicated output directory, got {:?}",
                self.paths.dist.base
            )));
        }
        for pattern in self.source_patterns() {
            let source = normalize(&glob_base(pattern.trim()));
            if source.starts_with(&dist) {
                return Err(Error::Config(format!(
                    "paths.dist.base {:?} would empty the sources of {:?}",
                    self.paths.dist.base, pattern
                )));
            }
        }
        if self.entry.script.trim().is_empty() {
            return Err(Error::Config("entry.script is empty".to_string()));
        }
        if self.output.script.trim().is_empty() {
            return Err(Error::Config("output.script is empty".to_string()));
        }
        Ok(())
    }
}

/// Drop `.` components so `./dist/` and `dist` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Everything a task needs to know about the project, loaded once.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub root: PathBuf,
    pub config: Config,
    pub mode: Mode,
}

impl BuildContext {
    pub fn new(root: impl Into<PathBuf>, config: Config, mode: Mode) -> Self {
        Self {
            root: root.into(),
            config,
            mode,
        }
    }

    /// Resolve a config-relative path against the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn dist_base(&self) -> PathBuf {
        self.resolve(&self.config.paths.dist.base)
    }

    pub fn dist_css(&self) -> PathBuf {
        self.resolve(&self.config.paths.dist.css)
    }

    pub fn dist_js(&self) -> PathBuf {
        self.resolve(&self.config.paths.dist.js)
    }

    pub fn dist_images(&self) -> PathBuf {
        self.resolve(&self.config.paths.dist.images)
    }

    pub fn dist_icons(&self) -> PathBuf {
        self.resolve(&self.config.paths.dist.icons)
    }

    pub fn views_report_path(&self) -> PathBuf {
        self.resolve(&self.config.reports.path)
            .join(&self.config.reports.output.views)
    }

    pub fn styles_report_path(&self) -> PathBuf {
        self.resolve(&self.config.reports.path)
            .join(&self.config.reports.output.styles)
    }
}
