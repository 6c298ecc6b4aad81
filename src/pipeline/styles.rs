use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;

use crate::config::BuildContext;
use crate::core::task::TaskOutput;
use crate::sources::write_output;
use crate::tools::Toolchain;
use crate::util::blocking;
use crate::{slog_debug, Error, Result};

use super::per_file_result;

/// `<dist css>/<entry stem>.css`.
pub fn stylesheet_destination(ctx: &BuildContext, entry: &Path) -> PathBuf {
    let stem = entry
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "style".to_string());
    ctx.dist_css().join(format!("{}.css", stem))
}

fn compile_entry(ctx: &BuildContext, tools: &dyn Toolchain, entry: &Path) -> Result<PathBuf> {
    if !entry.is_file() {
        return Err(Error::SourceNotFound(entry.to_path_buf()));
    }
    let mut css = tools.compile_stylesheet(entry, ctx.mode)?;
    if ctx.mode.is_production() {
        css = tools.postprocess_css(&css)?;
    }
    let dest = stylesheet_destination(ctx, entry);
    write_output(&dest, &css)?;
    slog_debug!("stylesheet {} -> {}", entry.display(), dest.display());
    Ok(dest)
}

/// Compile each stylesheet entry independently into its own CSS file.
///
/// Entries run concurrently and one failing entry does not stop the others;
/// the task fails afterwards if any entry did.
pub async fn build_styles(ctx: Arc<BuildContext>, tools: Arc<dyn Toolchain>) -> Result<TaskOutput> {
    let entries: Vec<PathBuf> = ctx
        .config
        .entry
        .styles
        .iter()
        .map(|e| ctx.resolve(e))
        .collect();

    let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::new();
    for entry in &entries {
        let dest = stylesheet_destination(&ctx, entry);
        if let Some(previous) = seen.insert(dest.clone(), entry) {
            return Err(Error::Config(format!(
                "stylesheet entries {} and {} both write {}",
                previous.display(),
                entry.display(),
                dest.display()
            )));
        }
    }

    let jobs = entries.iter().cloned().map(|entry| {
        let ctx = Arc::clone(&ctx);
        let tools = Arc::clone(&tools);
        async move {
            let result = blocking({
                let entry = entry.clone();
                move || compile_entry(&ctx, tools.as_ref(), &entry)
            })
            .await;
            (entry, result)
        }
    });

    let mut written = 0;
    let mut failures = Vec::new();
    for (entry, result) in join_all(jobs).await {
        match result {
            Ok(_) => written += 1,
            Err(e) => failures.push((entry, e)),
        }
    }

    per_file_result(entries.len(), failures)?;
    Ok(TaskOutput::written(written))
}
