//! Source discovery and output file helpers.
//!
//! A [`SourceSet`] is one configured glob pattern resolved against the
//! project root. Output paths keep each file's location relative to the
//! pattern's glob base, so `src/img/**/*.png` maps `src/img/a/b.png` to
//! `<dest>/a/b.png`.

use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{slog_debug, Error, Result};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Literal directory prefix of a glob pattern.
///
/// A pattern without wildcards is a single file; its base is the parent.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut saw_meta = false;
    for component in path.components() {
        let text = component.as_os_str().to_string_lossy();
        if text.contains(&GLOB_META[..]) {
            saw_meta = true;
            break;
        }
        base.push(component);
    }
    if !saw_meta {
        base.pop();
    }
    base
}

/// A glob pattern resolved against the project root.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pattern: String,
    base: PathBuf,
    matcher: GlobMatcher,
}

impl SourceSet {
    pub fn new(root: &Path, pattern: &str) -> Result<Self> {
        let full = root.join(pattern);
        let glob = GlobBuilder::new(&full.to_string_lossy())
            .literal_separator(true)
            .build()?;
        Ok(Self {
            pattern: pattern.to_string(),
            base: root.join(glob_base(pattern)),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Check whether an absolute path belongs to this set.
    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }

    /// All matching files, sorted.
    ///
    /// A missing base directory is an error: the pattern points nowhere.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.base.is_dir() {
            return Err(Error::SourceNotFound(self.base.clone()));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.base).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        slog_debug!("SourceSet {} matched {} file(s)", self.pattern, files.len());
        Ok(files)
    }

    /// Path of `file` relative to the glob base.
    pub fn relative<'a>(&self, file: &'a Path) -> Option<&'a Path> {
        file.strip_prefix(&self.base).ok()
    }

    /// Destination of `file` under `dest_dir`, optionally with a new extension.
    pub fn destination(&self, file: &Path, dest_dir: &Path, extension: Option<&str>) -> PathBuf {
        let relative = self
            .relative(file)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| file.file_name().map(PathBuf::from).unwrap_or_default());
        let mut dest = dest_dir.join(relative);
        if let Some(ext) = extension {
            dest.set_extension(ext);
        }
        dest
    }
}

/// True when `dest` is missing or older than `src`.
pub fn is_newer(src: &Path, dest: &Path) -> Result<bool> {
    let dest_meta = match fs::metadata(dest) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    let src_modified = fs::metadata(src)?.modified()?;
    Ok(src_modified > dest_meta.modified()?)
}

/// Write `bytes` to `path`, creating parent directories.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Remove everything inside `dir`, keeping the directory itself.
///
/// Returns the number of top-level entries removed.
pub fn empty_dir(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}
