//! Template and stylesheet linting.
//!
//! Development: findings are reported and written to disk, the task passes.
//! Production: findings go to the console and fail the task.

use crate::config::BuildContext;
use crate::core::task::TaskOutput;
use crate::report;
use crate::sources::{write_output, SourceSet};
use crate::tools::{LintViolation, Toolchain};
use crate::{slog_warn, Error, Result};

const VIEWS_LINTER: &str = "pug-lint";
const STYLES_LINTER: &str = "stylelint";

fn verdict(tool: &str, ctx: &BuildContext, violations: &[LintViolation]) -> Result<TaskOutput> {
    if violations.is_empty() {
        return Ok(TaskOutput::default());
    }
    if ctx.mode.is_production() {
        return Err(Error::LintFailed {
            tool: tool.to_string(),
            violations: violations.len(),
        });
    }
    slog_warn!("{} reported {} finding(s)", tool, violations.len());
    Ok(TaskOutput {
        violations: violations.len(),
        ..TaskOutput::default()
    })
}

/// Lint templates. Development writes findings to a plain-text report file
/// instead of printing; production prints and fails on any finding.
pub fn lint_views(ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    let files = SourceSet::new(&ctx.root, &ctx.config.paths.src.views)?.files()?;
    let violations = tools.lint_views(&files)?;

    if ctx.mode.is_development() {
        if !violations.is_empty() {
            let text: String = violations.iter().map(|v| format!("{}\n", v)).collect();
            write_output(&ctx.views_report_path(), text.as_bytes())?;
        }
    } else {
        report::violations(VIEWS_LINTER, &violations);
    }
    verdict(VIEWS_LINTER, ctx, &violations)
}

/// Lint stylesheets. Both modes print; development also saves a JSON report.
pub fn lint_styles(ctx: &BuildContext, tools: &dyn Toolchain) -> Result<TaskOutput> {
    let files = SourceSet::new(&ctx.root, &ctx.config.paths.src.styles)?.files()?;
    let violations = tools.lint_styles(&files)?;

    report::violations(STYLES_LINTER, &violations);
    if ctx.mode.is_development() {
        let json = serde_json::to_string_pretty(&violations)?;
        write_output(&ctx.styles_report_path(), json.as_bytes())?;
    }
    verdict(STYLES_LINTER, ctx, &violations)
}
