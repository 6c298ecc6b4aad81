use crate::config::BuildContext;
use crate::core::task::TaskOutput;
use crate::sources::write_output;
use crate::tools::Toolchain;
use crate::{slog_debug, Error, Result};

/// Bundle the script entry into `<dist js>/<output.script>`.
pub fn build_scripts(ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    let entry = ctx.resolve(&ctx.config.entry.script);
    if !entry.is_file() {
        return Err(Error::SourceNotFound(entry));
    }

    let bundle = tools.bundle_script(&entry, ctx.mode)?;
    let dest = ctx.dist_js().join(&ctx.config.output.script);
    write_output(&dest, &bundle)?;
    slog_debug!(
        "bundle {} -> {} ({} bytes)",
        entry.display(),
        dest.display(),
        bundle.len()
    );
    Ok(TaskOutput::written(1))
}
