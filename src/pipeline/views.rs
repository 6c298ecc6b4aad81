use crate::config::BuildContext;
use crate::core::task::TaskOutput;
use crate::sources::{write_output, SourceSet};
use crate::tools::Toolchain;
use crate::{slog_debug, Result};

use super::per_file_result;

/// Compile every template to `<dist>/<relative path>.html`.
///
/// Development output is pretty-printed, production output is minified; the
/// toolchain picks the flags from the mode.
pub fn build_views(ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    let set = SourceSet::new(&ctx.root, &ctx.config.paths.src.views)?;
    let files = set.files()?;
    let dest_dir = ctx.dist_base();

    let mut written = 0;
    let mut failures = Vec::new();
    for file in &files {
        let dest = set.destination(file, &dest_dir, Some("html"));
        match tools
            .compile_view(file, ctx.mode)
            .and_then(|html| write_output(&dest, &html))
        {
            Ok(()) => {
                slog_debug!("view {} -> {}", file.display(), dest.display());
                written += 1;
            }
            Err(e) => failures.push((file.clone(), e)),
        }
    }

    per_file_result(files.len(), failures)?;
    Ok(TaskOutput::written(written))
}
