//! Pipeline steps: what each [`TaskKind`] does to the file tree.
//!
//! Every step reads its inputs from the [`BuildContext`], hands the actual
//! transformation to the [`Toolchain`], and writes results under the output
//! directory. Steps never panic on bad input; they return an error that the
//! scheduler records against the task.

mod assets;
mod lint;
mod scripts;
mod styles;
mod views;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BuildContext;
use crate::core::task::{TaskKind, TaskOutput};
use crate::tools::Toolchain;
use crate::util::blocking;
use crate::{sources, slog_debug, Error, Result};

pub use assets::{build_icons, build_images};
pub use lint::{lint_styles, lint_views};
pub use scripts::build_scripts;
pub use styles::{build_styles, stylesheet_destination};
pub use views::build_views;

/// Run one pipeline step to completion.
pub async fn run_task(
    kind: TaskKind,
    ctx: Arc<BuildContext>,
    tools: Arc<dyn Toolchain>,
) -> Result<TaskOutput> {
    slog_debug!("run_task {} mode={}", kind, ctx.mode);
    match kind {
        // Entries compile concurrently, so this one manages its own blocking calls.
        TaskKind::Styles => build_styles(ctx, tools).await,
        _ => blocking(move || run_blocking(kind, &ctx, tools.as_ref())).await,
    }
}

fn run_blocking(kind: TaskKind, ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    match kind {
        TaskKind::EmptyDist => empty_dist(ctx),
        TaskKind::Views => build_views(ctx, tools),
        TaskKind::LintViews => lint_views(ctx, tools),
        TaskKind::LintStyles => lint_styles(ctx, tools),
        TaskKind::Scripts => build_scripts(ctx, tools),
        TaskKind::Images => build_images(ctx, tools),
        TaskKind::Icons => build_icons(ctx, tools),
        TaskKind::Styles => Err(Error::Validation(
            "styles must run through run_task".to_string(),
        )),
    }
}

/// Remove everything under the output directory.
///
/// Refuses to run when `paths.dist.base` points outside the project or over
/// its sources, however the config was built.
pub fn empty_dist(ctx: &BuildContext) -> Result<TaskOutput> {
    ctx.config.validate()?;
    let removed = sources::empty_dir(&ctx.dist_base())?;
    slog_debug!("empty_dist removed {} entries", removed);
    Ok(TaskOutput::written(removed))
}

/// Turn per-file failures into one task error once every file has been tried.
fn per_file_result(total: usize, failures: Vec<(PathBuf, Error)>) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    let details = failures
        .iter()
        .map(|(path, err)| format!("{}: {}", path.display(), err))
        .collect::<Vec<_>>()
        .join("; ");
    Err(Error::PartialFailure {
        failed: failures.len(),
        total,
        details,
    })
}
