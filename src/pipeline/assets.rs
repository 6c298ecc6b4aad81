use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuildContext;
use crate::core::task::TaskOutput;
use crate::sources::{is_newer, write_output, SourceSet};
use crate::tools::Toolchain;
use crate::{slog_debug, Result};

use super::per_file_result;

/// Copy (development) or optimize (production) every file of `set` into
/// `dest_dir`, skipping files whose output is already up to date.
fn process_assets<F>(
    ctx: &BuildContext,
    set: &SourceSet,
    dest_dir: &Path,
    optimize: F,
) -> Result<TaskOutput>
where
    F: Fn(&Path) -> Result<Vec<u8>>,
{
    let files = set.files()?;
    let mut output = TaskOutput::default();
    let mut failures: Vec<(PathBuf, _)> = Vec::new();

    for file in &files {
        let dest = set.destination(file, dest_dir, None);
        let result = is_newer(file, &dest).and_then(|newer| {
            if !newer {
                return Ok(false);
            }
            let bytes = if ctx.mode.is_production() {
                optimize(file)?
            } else {
                fs::read(file)?
            };
            write_output(&dest, &bytes)?;
            Ok(true)
        });
        match result {
            Ok(true) => output.written += 1,
            Ok(false) => {
                slog_debug!("unchanged, skipping {}", file.display());
                output.skipped += 1;
            }
            Err(e) => failures.push((file.clone(), e)),
        }
    }

    per_file_result(files.len(), failures)?;
    Ok(output)
}

pub fn build_images(ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    let set = SourceSet::new(&ctx.root, &ctx.config.paths.src.images)?;
    process_assets(ctx, &set, &ctx.dist_images(), |file| tools.optimize_image(file))
}

pub fn build_icons(ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    let set = SourceSet::new(&ctx.root, &ctx.config.paths.src.icons)?;
    process_assets(ctx, &set, &ctx.dist_icons(), |file| tools.optimize_icon(file))
}
